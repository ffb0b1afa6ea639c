use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub gateway_token: String,
    pub notify_webhook_url: String,
    pub email_webhook_url: String,
    pub directory_url: String,
    pub webhook_signing_secret: String,
    pub outbox_poll_secs: u64,
    pub outbox_max_attempts: i64,
    pub outbox_retention_hours: i64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "talentbook.db".to_string()),
            gateway_token: env::var("GATEWAY_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            notify_webhook_url: env::var("NOTIFY_WEBHOOK_URL").unwrap_or_default(),
            email_webhook_url: env::var("EMAIL_WEBHOOK_URL").unwrap_or_default(),
            directory_url: env::var("DIRECTORY_URL").unwrap_or_default(),
            webhook_signing_secret: env::var("WEBHOOK_SIGNING_SECRET").unwrap_or_default(),
            outbox_poll_secs: env::var("OUTBOX_POLL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            outbox_max_attempts: env::var("OUTBOX_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            outbox_retention_hours: env::var("OUTBOX_RETENTION_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(72),
        }
    }

    pub fn signing_secret(&self) -> Option<String> {
        Some(self.webhook_signing_secret.clone()).filter(|s| !s.is_empty())
    }
}
