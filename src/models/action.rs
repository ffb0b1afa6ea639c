use serde::Deserialize;

use crate::errors::AppError;
use crate::models::BookingStatus;

/// Wire shape of `POST /api/bookings/:id/actions`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    pub action: String,
    pub response_notes: Option<String>,
    pub counter_amount: Option<i64>,
    pub counter_notes: Option<String>,
    pub cancellation_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingAction {
    Accept { notes: Option<String> },
    Decline { notes: Option<String> },
    Counter { amount: i64, notes: Option<String> },
    AcceptCounter,
    Confirm,
    Cancel { reason: Option<String> },
    Complete,
    NoShow,
}

impl BookingAction {
    pub fn name(&self) -> &'static str {
        match self {
            BookingAction::Accept { .. } => "accept",
            BookingAction::Decline { .. } => "decline",
            BookingAction::Counter { .. } => "counter",
            BookingAction::AcceptCounter => "accept_counter",
            BookingAction::Confirm => "confirm",
            BookingAction::Cancel { .. } => "cancel",
            BookingAction::Complete => "complete",
            BookingAction::NoShow => "no_show",
        }
    }

    /// Status the booking lands in when the action succeeds normally.
    pub fn target(&self) -> BookingStatus {
        match self {
            BookingAction::Accept { .. } | BookingAction::AcceptCounter => BookingStatus::Accepted,
            BookingAction::Decline { .. } => BookingStatus::Declined,
            BookingAction::Counter { .. } => BookingStatus::Counter,
            BookingAction::Confirm => BookingStatus::Confirmed,
            BookingAction::Cancel { .. } => BookingStatus::Cancelled,
            BookingAction::Complete => BookingStatus::Completed,
            BookingAction::NoShow => BookingStatus::NoShow,
        }
    }
}

impl TryFrom<ActionRequest> for BookingAction {
    type Error = AppError;

    fn try_from(req: ActionRequest) -> Result<Self, Self::Error> {
        let action = req.action.trim();

        if action != "counter" && req.counter_amount.is_some() {
            return Err(AppError::BadRequest(format!(
                "counterAmount is only valid for the counter action, not {action}"
            )));
        }

        let parsed = match action {
            "accept" => BookingAction::Accept {
                notes: clean(req.response_notes),
            },
            "decline" => BookingAction::Decline {
                notes: clean(req.response_notes),
            },
            "counter" => {
                let amount = req.counter_amount.ok_or_else(|| {
                    AppError::BadRequest("counterAmount is required for counter".to_string())
                })?;
                if amount < 0 {
                    return Err(AppError::BadRequest(
                        "counterAmount must not be negative".to_string(),
                    ));
                }
                BookingAction::Counter {
                    amount,
                    notes: clean(req.counter_notes),
                }
            }
            "accept_counter" => BookingAction::AcceptCounter,
            "confirm" => BookingAction::Confirm,
            "cancel" => BookingAction::Cancel {
                reason: clean(req.cancellation_reason),
            },
            "complete" => BookingAction::Complete,
            "no_show" => BookingAction::NoShow,
            other => {
                return Err(AppError::BadRequest(format!("unknown action: {other}")));
            }
        };

        Ok(parsed)
    }
}

fn clean(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}
