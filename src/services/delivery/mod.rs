pub mod log;
pub mod webhook;

use async_trait::async_trait;
use serde::Deserialize;

use crate::models::{EmailTemplate, EmailTrigger, NotificationEvent};

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, event: &NotificationEvent) -> anyhow::Result<()>;
}

#[async_trait]
pub trait EmailSink: Send + Sync {
    async fn send(&self, template: EmailTemplate, email: &EmailTrigger) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Contact {
    pub name: String,
    pub email: String,
}

/// Looks up display names and addresses; the booking core only stores ids.
#[async_trait]
pub trait ActorDirectory: Send + Sync {
    async fn contact(&self, actor_id: &str) -> anyhow::Result<Option<Contact>>;
}
