pub mod mailer;
pub mod notifier;
pub mod realtime;
pub mod sms;
pub mod storage;
