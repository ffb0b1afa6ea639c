use serde_json::json;

use crate::models::{
    Actor, Booking, BookingAction, EmailRequest, EmailTemplate, NotificationEvent, OutboxMessage,
};
use crate::services::machine::{LedgerOp, Transition};

/// Outbox records announcing a completed transition.
pub fn for_transition(transition: &Transition, action: &BookingAction, actor: &Actor) -> Vec<OutboxMessage> {
    let booking = &transition.updated;
    let number = &booking.booking_number;
    let mut out = vec![];

    match action {
        BookingAction::Accept { notes } => {
            out.push(notify(
                &booking.client_id,
                "booking_accepted",
                "Booking accepted",
                format!(
                    "Your booking {number} was accepted. {} coins are now held in escrow.",
                    booking.total_amount
                ),
                booking,
                actor,
                json!({ "escrowed": booking.total_amount }),
            ));
            out.push(email(EmailTemplate::BookingAccepted, booking, Some(booking.total_amount), notes.clone()));
        }
        BookingAction::Decline { notes } => {
            out.push(notify(
                &booking.client_id,
                "booking_declined",
                "Booking declined",
                format!("Your booking {number} was declined."),
                booking,
                actor,
                json!({ "reason": notes }),
            ));
            out.push(email(EmailTemplate::BookingDeclined, booking, None, notes.clone()));
        }
        BookingAction::Counter { amount, notes } => {
            out.push(notify(
                &booking.client_id,
                "booking_counter_offer",
                "New counter-offer",
                format!(
                    "Your booking {number} received a counter-offer of {amount} coins (originally {}).",
                    booking.total_amount
                ),
                booking,
                actor,
                json!({ "counter_amount": amount, "counter_notes": notes }),
            ));
        }
        BookingAction::AcceptCounter => {
            out.push(notify(
                &booking.provider_id,
                "booking_counter_accepted",
                "Counter-offer accepted",
                format!(
                    "Your counter-offer for booking {number} was accepted. {} coins are now held in escrow.",
                    booking.total_amount
                ),
                booking,
                actor,
                json!({ "escrowed": booking.total_amount }),
            ));
        }
        BookingAction::Confirm => {
            for recipient in counterparts(booking, actor) {
                out.push(notify(
                    recipient,
                    "booking_confirmed",
                    "Booking confirmed",
                    format!("Booking {number} has been confirmed."),
                    booking,
                    actor,
                    json!({}),
                ));
            }
        }
        BookingAction::Cancel { reason } => {
            let refunded = match transition.ledger {
                LedgerOp::Refund(amount) => Some(amount),
                _ => None,
            };
            let body = match refunded {
                Some(amount) => format!(
                    "Booking {number} was cancelled. {amount} coins were returned to the client."
                ),
                None => format!("Booking {number} was cancelled."),
            };
            for recipient in counterparts(booking, actor) {
                out.push(notify(
                    recipient,
                    "booking_cancelled",
                    "Booking cancelled",
                    body.clone(),
                    booking,
                    actor,
                    json!({ "reason": reason, "refunded": refunded }),
                ));
            }
        }
        BookingAction::Complete | BookingAction::NoShow => {
            let (kind, title, client_body) = if matches!(action, BookingAction::Complete) {
                (
                    "booking_completed",
                    "Booking completed",
                    format!("Booking {number} has been marked as completed."),
                )
            } else {
                (
                    "booking_no_show",
                    "Booking marked as no-show",
                    format!("Booking {number} was marked as a no-show."),
                )
            };
            out.push(notify(&booking.client_id, kind, title, client_body, booking, actor, json!({})));
            out.push(notify(
                &booking.provider_id,
                "booking_payment_received",
                "Payment received",
                format!(
                    "{} coins for booking {number} were added to your balance.",
                    booking.total_amount
                ),
                booking,
                actor,
                json!({ "paid": booking.total_amount }),
            ));
        }
    }

    out
}

/// Tells the client why their booking was declined without the provider choosing to.
pub fn for_auto_decline(booking: &Booking, actor: &Actor, required: i64, available: i64) -> Vec<OutboxMessage> {
    vec![notify(
        &booking.client_id,
        "booking_declined_insufficient_funds",
        "Booking declined: insufficient coins",
        format!(
            "Booking {} could not be accepted: it requires {required} coins and your balance is {available}. Top up and book again.",
            booking.booking_number
        ),
        booking,
        actor,
        json!({ "required": required, "available": available }),
    )]
}

fn counterparts<'a>(booking: &'a Booking, actor: &Actor) -> Vec<&'a str> {
    [booking.client_id.as_str(), booking.provider_id.as_str()]
        .into_iter()
        .filter(|id| *id != actor.id)
        .collect()
}

fn notify(
    recipient: &str,
    kind: &str,
    title: &str,
    body: String,
    booking: &Booking,
    actor: &Actor,
    extra: serde_json::Value,
) -> OutboxMessage {
    let mut data = json!({
        "booking_id": booking.id,
        "booking_number": booking.booking_number,
        "status": booking.status.as_str(),
        "performed_by": actor.id,
    });
    if let (Some(data), serde_json::Value::Object(extra)) = (data.as_object_mut(), extra) {
        data.extend(extra);
    }

    OutboxMessage::Notification(NotificationEvent {
        actor_id: recipient.to_string(),
        kind: kind.to_string(),
        title: title.to_string(),
        body,
        data,
    })
}

fn email(
    template: EmailTemplate,
    booking: &Booking,
    total_amount: Option<i64>,
    reason: Option<String>,
) -> OutboxMessage {
    OutboxMessage::Email(EmailRequest {
        template,
        recipient_id: booking.client_id.clone(),
        provider_id: booking.provider_id.clone(),
        service_type: booking.service_type.label().to_string(),
        event_date: booking.event_date.format("%Y-%m-%d %H:%M").to_string(),
        total_amount,
        booking_number: booking.booking_number.clone(),
        reason,
    })
}
