use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::Deserialize;
use sqlx::FromRow;
use validator::Validate;

pub const CODE_TTL_MINUTES: i64 = 10;
pub const MAX_ATTEMPTS: i32 = 5;
pub const RESEND_COOLDOWN_SECONDS: i64 = 60;

/// Represents the 'phone_verifications' table in the database.
#[derive(Debug, Clone, FromRow)]
pub struct PhoneVerification {
    pub id: i64,
    pub user_id: i64,
    pub phone: String,
    pub code_hash: String,
    pub attempts: i32,
    pub expires_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Why a stored code can no longer be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeState {
    Usable,
    Expired,
    Exhausted,
    Consumed,
}

impl PhoneVerification {
    pub fn state(&self, now: DateTime<Utc>) -> CodeState {
        if self.consumed_at.is_some() {
            CodeState::Consumed
        } else if self.attempts >= MAX_ATTEMPTS {
            CodeState::Exhausted
        } else if now >= self.expires_at {
            CodeState::Expired
        } else {
            CodeState::Usable
        }
    }

    /// Seconds the caller must still wait before another code is sent.
    pub fn cooldown_remaining(&self, now: DateTime<Utc>) -> i64 {
        let ready_at = self.created_at + Duration::seconds(RESEND_COOLDOWN_SECONDS);
        (ready_at - now).num_seconds().max(0)
    }
}

/// Six random digits, zero padded.
pub fn generate_code() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{n:06}")
}

pub fn code_expiry(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::minutes(CODE_TTL_MINUTES)
}

#[derive(Debug, Deserialize, Validate)]
pub struct SendCodeRequest {
    #[validate(length(min = 6, max = 20))]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyCodeRequest {
    #[validate(length(equal = 6, message = "Code must be 6 digits"))]
    pub code: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(attempts: i32, expires_in: i64, consumed: bool) -> PhoneVerification {
        let now = Utc::now();
        PhoneVerification {
            id: 1,
            user_id: 1,
            phone: "+254712345678".to_string(),
            code_hash: String::new(),
            attempts,
            expires_at: now + Duration::seconds(expires_in),
            consumed_at: consumed.then_some(now),
            created_at: now - Duration::seconds(30),
        }
    }

    #[test]
    fn codes_are_six_digits() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn state_reflects_expiry_attempts_and_use() {
        let now = Utc::now();
        assert_eq!(record(0, 300, false).state(now), CodeState::Usable);
        assert_eq!(record(0, -1, false).state(now), CodeState::Expired);
        assert_eq!(record(MAX_ATTEMPTS, 300, false).state(now), CodeState::Exhausted);
        assert_eq!(record(0, 300, true).state(now), CodeState::Consumed);
    }

    #[test]
    fn resend_cooldown_counts_down() {
        let r = record(0, 300, false);
        let remaining = r.cooldown_remaining(Utc::now());
        assert!(remaining > 0 && remaining <= 30);
        assert_eq!(r.cooldown_remaining(Utc::now() + Duration::seconds(120)), 0);
    }

    #[test]
    fn expiry_is_ten_minutes_out() {
        let now = Utc::now();
        assert_eq!(code_expiry(now) - now, Duration::minutes(10));
    }
}
