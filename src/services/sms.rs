//! SMS delivery through Twilio, with a logging fallback for development.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;

use crate::{config::TwilioConfig, error::AppError};

/// Country prefix applied to local numbers such as `0712 345678`.
pub const DEFAULT_COUNTRY_CODE: &str = "254";

static E164: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\+[1-9]\d{7,14}$").expect("valid regex"));

/// Normalizes a phone number to E.164.
///
/// Spaces, dashes and parentheses are ignored. A leading `0` is replaced by
/// the default country code; a bare country code gets a `+`.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let compact: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
        .collect();

    let candidate = if let Some(rest) = compact.strip_prefix("00") {
        format!("+{rest}")
    } else if compact.starts_with('+') {
        compact
    } else if let Some(rest) = compact.strip_prefix('0') {
        format!("+{DEFAULT_COUNTRY_CODE}{rest}")
    } else {
        format!("+{compact}")
    };

    E164.is_match(&candidate).then_some(candidate)
}

#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send(&self, to: &str, body: &str) -> Result<(), AppError>;
}

pub struct TwilioSms {
    client: reqwest::Client,
    config: TwilioConfig,
}

#[derive(Deserialize)]
struct TwilioError {
    message: Option<String>,
}

impl TwilioSms {
    pub fn new(config: TwilioConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.config.account_sid
        )
    }
}

#[async_trait]
impl SmsSender for TwilioSms {
    async fn send(&self, to: &str, body: &str) -> Result<(), AppError> {
        let response = self
            .client
            .post(self.endpoint())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[("To", to), ("From", self.config.from_number.as_str()), ("Body", body)])
            .send()
            .await
            .map_err(|e| AppError::InternalServerError(format!("twilio request: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response
                .json::<TwilioError>()
                .await
                .ok()
                .and_then(|e| e.message)
                .unwrap_or_default();
            return Err(AppError::InternalServerError(format!("twilio returned {status}: {detail}")));
        }
        tracing::info!(%to, "sms sent");
        Ok(())
    }
}

/// Fallback used when Twilio credentials are absent.
#[derive(Default)]
pub struct MockSms;

#[async_trait]
impl SmsSender for MockSms {
    async fn send(&self, to: &str, body: &str) -> Result<(), AppError> {
        tracing::info!(%to, %body, "sms (mock, not sent)");
        Ok(())
    }
}
