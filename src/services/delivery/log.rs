use async_trait::async_trait;

use super::{ActorDirectory, Contact, EmailSink, NotificationSink};
use crate::models::{EmailTemplate, EmailTrigger, NotificationEvent};

/// Stand-in used when no delivery endpoint is configured.
pub struct LogOnly;

#[async_trait]
impl NotificationSink for LogOnly {
    async fn notify(&self, event: &NotificationEvent) -> anyhow::Result<()> {
        tracing::info!(
            actor_id = %event.actor_id,
            kind = %event.kind,
            title = %event.title,
            "notification (delivery not configured)"
        );
        Ok(())
    }
}

#[async_trait]
impl EmailSink for LogOnly {
    async fn send(&self, template: EmailTemplate, email: &EmailTrigger) -> anyhow::Result<()> {
        tracing::info!(
            template = template.as_str(),
            booking_number = %email.booking_number,
            "email (delivery not configured)"
        );
        Ok(())
    }
}

#[async_trait]
impl ActorDirectory for LogOnly {
    async fn contact(&self, actor_id: &str) -> anyhow::Result<Option<Contact>> {
        anyhow::bail!("no actor directory configured, cannot resolve {actor_id}")
    }
}
