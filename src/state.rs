use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;
use tokio::sync::Notify;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::services::delivery::{ActorDirectory, EmailSink, NotificationSink};

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub notifier: Box<dyn NotificationSink>,
    pub mailer: Box<dyn EmailSink>,
    pub directory: Box<dyn ActorDirectory>,
    /// Wakes the outbox dispatcher after a commit that recorded events.
    pub outbox_signal: Notify,
}

impl AppState {
    pub fn conn(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        crate::db::lock(&self.db)
    }
}
