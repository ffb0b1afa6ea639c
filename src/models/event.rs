use serde::{Deserialize, Serialize};

/// Record handed to the notification collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationEvent {
    pub actor_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmailTemplate {
    BookingAccepted,
    BookingDeclined,
}

impl EmailTemplate {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailTemplate::BookingAccepted => "booking_accepted",
            EmailTemplate::BookingDeclined => "booking_declined",
        }
    }
}

/// Email trigger as stored in the outbox. Holds actor ids only; contact details
/// are resolved through the actor directory at dispatch time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmailRequest {
    pub template: EmailTemplate,
    pub recipient_id: String,
    pub provider_id: String,
    pub service_type: String,
    pub event_date: String,
    pub total_amount: Option<i64>,
    pub booking_number: String,
    pub reason: Option<String>,
}

/// Payload delivered to the email collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmailTrigger {
    pub recipient_email: String,
    pub recipient_name: String,
    pub provider_name: String,
    pub service_type: String,
    pub event_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<i64>,
    pub booking_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutboxMessage {
    Notification(NotificationEvent),
    Email(EmailRequest),
}

impl OutboxMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            OutboxMessage::Notification(_) => "notification",
            OutboxMessage::Email(_) => "email",
        }
    }

    pub fn to_payload(&self) -> serde_json::Result<String> {
        match self {
            OutboxMessage::Notification(event) => serde_json::to_string(event),
            OutboxMessage::Email(request) => serde_json::to_string(request),
        }
    }

    pub fn from_parts(kind: &str, payload: &str) -> anyhow::Result<Self> {
        match kind {
            "notification" => Ok(OutboxMessage::Notification(serde_json::from_str(payload)?)),
            "email" => Ok(OutboxMessage::Email(serde_json::from_str(payload)?)),
            other => anyhow::bail!("unknown outbox kind: {other}"),
        }
    }
}
