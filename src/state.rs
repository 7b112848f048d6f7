use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::{
    config::{Config, StorageBackend},
    error::AppError,
    services::{
        mailer::{LogMailer, Mailer, SmtpMailer},
        realtime::Hub,
        sms::{MockSms, SmsSender, TwilioSms},
        storage::{FileStorage, LocalStorage, S3Storage},
    },
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub hub: Arc<Hub>,
    pub storage: Arc<dyn FileStorage>,
    pub mailer: Arc<dyn Mailer>,
    pub sms: Arc<dyn SmsSender>,
}

impl AppState {
    /// Wires the side-effect services selected by `config`.
    ///
    /// Without SMTP or Twilio credentials the log-only implementations are
    /// used, so a development setup needs nothing but a database.
    pub fn new(pool: PgPool, config: Config) -> Result<Self, AppError> {
        let storage: Arc<dyn FileStorage> = match &config.storage {
            StorageBackend::Local => Arc::new(LocalStorage::new(&config.upload_dir, &config.public_base_url)),
            StorageBackend::S3(s3) => Arc::new(S3Storage::new(s3.clone())),
        };

        let mailer: Arc<dyn Mailer> = match &config.smtp {
            Some(smtp) => Arc::new(SmtpMailer::new(smtp)?),
            None => {
                tracing::info!("SMTP not configured, emails will only be logged");
                Arc::new(LogMailer)
            }
        };

        let sms: Arc<dyn SmsSender> = match &config.twilio {
            Some(twilio) => Arc::new(TwilioSms::new(twilio.clone())),
            None => {
                tracing::info!("Twilio not configured, SMS will only be logged");
                Arc::new(MockSms)
            }
        };

        Ok(Self {
            pool,
            config,
            hub: Arc::new(Hub::new()),
            storage,
            mailer,
            sms,
        })
    }
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}
