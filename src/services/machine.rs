//! Transition table for bookings.
//!
//! Planning is pure: given the booking as last read and the requested action,
//! it produces the booking as it should be written and the single ledger
//! operation the move requires. Whether coins are held is derived from the
//! status being left, never from the amount.

use chrono::NaiveDateTime;

use crate::errors::AppError;
use crate::models::{Actor, Booking, BookingAction, BookingStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerOp {
    None,
    /// Debit the client.
    Escrow(i64),
    /// Credit the provider with the held coins.
    Payout(i64),
    /// Return the held coins to the client.
    Refund(i64),
}

#[derive(Debug, Clone)]
pub struct Transition {
    pub from: BookingStatus,
    pub to: BookingStatus,
    pub ledger: LedgerOp,
    pub updated: Booking,
}

#[derive(Debug, Clone)]
pub enum Plan {
    /// The booking is already where the action would take it.
    AlreadyApplied,
    Apply(Transition),
}

pub fn plan(
    booking: &Booking,
    action: &BookingAction,
    actor: &Actor,
    at: NaiveDateTime,
) -> Result<Plan, AppError> {
    use BookingStatus as S;

    let from = booking.status;

    if from == action.target() {
        return match action {
            BookingAction::Counter { amount, .. } if booking.counter_amount != Some(*amount) => {
                Err(invalid(action, from))
            }
            _ => Ok(Plan::AlreadyApplied),
        };
    }

    let mut updated = booking.clone();
    updated.updated_at = at;

    let ledger = match (from, action) {
        (S::Pending, BookingAction::Accept { notes }) => {
            respond(&mut updated, notes.clone(), at);
            LedgerOp::Escrow(booking.total_amount)
        }
        (S::Pending | S::Counter, BookingAction::Decline { notes }) => {
            respond(&mut updated, notes.clone(), at);
            updated.counter_amount = None;
            LedgerOp::None
        }
        (S::Pending, BookingAction::Counter { amount, notes }) => {
            respond(&mut updated, None, at);
            updated.counter_amount = Some(*amount);
            updated.counter_notes = notes.clone();
            LedgerOp::None
        }
        (S::Counter, BookingAction::AcceptCounter) => {
            let amount = booking.counter_amount.ok_or_else(|| {
                AppError::Internal(anyhow::anyhow!(
                    "booking {} is in counter without a counter amount",
                    booking.id
                ))
            })?;
            updated.total_amount = amount;
            updated.counter_amount = None;
            LedgerOp::Escrow(amount)
        }
        (S::Accepted, BookingAction::Confirm) => {
            updated.confirmed_at = Some(at);
            LedgerOp::None
        }
        (S::Pending | S::Counter | S::Accepted | S::Confirmed, BookingAction::Cancel { reason }) => {
            updated.counter_amount = None;
            updated.cancelled_at = Some(at);
            updated.cancelled_by = Some(actor.id.clone());
            updated.cancellation_reason = reason.clone();
            if from.holds_escrow() {
                LedgerOp::Refund(booking.total_amount)
            } else {
                LedgerOp::None
            }
        }
        (S::Confirmed, BookingAction::Complete | BookingAction::NoShow) => {
            updated.completed_at = Some(at);
            LedgerOp::Payout(booking.total_amount)
        }
        _ => return Err(invalid(action, from)),
    };

    updated.status = action.target();

    Ok(Plan::Apply(Transition {
        from,
        to: updated.status,
        ledger,
        updated,
    }))
}

/// The system-initiated `pending -> declined` move taken when the client cannot
/// cover an accepted booking.
pub fn auto_decline(booking: &Booking, at: NaiveDateTime) -> Transition {
    let mut updated = booking.clone();
    respond(&mut updated, None, at);
    updated.status = BookingStatus::Declined;
    updated.counter_amount = None;
    updated.updated_at = at;

    Transition {
        from: booking.status,
        to: BookingStatus::Declined,
        ledger: LedgerOp::None,
        updated,
    }
}

fn respond(booking: &mut Booking, notes: Option<String>, at: NaiveDateTime) {
    if booking.responded_at.is_none() {
        booking.responded_at = Some(at);
    }
    if notes.is_some() {
        booking.response_notes = notes;
    }
}

fn invalid(action: &BookingAction, status: BookingStatus) -> AppError {
    AppError::InvalidTransition {
        action: action.name(),
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ServiceType;

    fn booking(status: BookingStatus) -> Booking {
        let now = chrono::Utc::now().naive_utc();
        Booking {
            id: "bk-1".to_string(),
            booking_number: "BK-0001".to_string(),
            client_id: "client-1".to_string(),
            provider_id: "provider-1".to_string(),
            service_type: ServiceType::Performance,
            event_date: now,
            total_amount: 500,
            counter_amount: (status == BookingStatus::Counter).then_some(700),
            client_notes: None,
            response_notes: None,
            counter_notes: None,
            status,
            responded_at: None,
            confirmed_at: None,
            completed_at: None,
            cancelled_at: None,
            cancelled_by: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn all_actions() -> Vec<BookingAction> {
        vec![
            BookingAction::Accept { notes: None },
            BookingAction::Decline { notes: None },
            BookingAction::Counter {
                amount: 700,
                notes: None,
            },
            BookingAction::AcceptCounter,
            BookingAction::Confirm,
            BookingAction::Cancel { reason: None },
            BookingAction::Complete,
            BookingAction::NoShow,
        ]
    }

    fn plan_for(status: BookingStatus, action: &BookingAction) -> Result<Plan, AppError> {
        let now = chrono::Utc::now().naive_utc();
        plan(&booking(status), action, &Actor::user("provider-1"), now)
    }

    fn transition(status: BookingStatus, action: BookingAction) -> Transition {
        match plan_for(status, &action).unwrap() {
            Plan::Apply(t) => t,
            Plan::AlreadyApplied => panic!("expected a transition"),
        }
    }

    #[test]
    fn test_legal_edges_match_table() {
        use BookingStatus as S;
        let legal: &[(S, &str)] = &[
            (S::Pending, "accept"),
            (S::Pending, "decline"),
            (S::Pending, "counter"),
            (S::Pending, "cancel"),
            (S::Counter, "accept_counter"),
            (S::Counter, "decline"),
            (S::Counter, "cancel"),
            // same amount as the outstanding counter: replay
            (S::Counter, "counter"),
            (S::Accepted, "confirm"),
            (S::Accepted, "cancel"),
            (S::Confirmed, "cancel"),
            (S::Confirmed, "complete"),
            (S::Confirmed, "no_show"),
        ];

        for status in BookingStatus::ALL {
            for action in all_actions() {
                let result = plan_for(status, &action);
                let replay = status == action.target();
                let expected_ok = replay || legal.contains(&(status, action.name()));
                assert_eq!(
                    result.is_ok(),
                    expected_ok,
                    "{} from {status}",
                    action.name()
                );
                if let Err(e) = result {
                    assert!(matches!(e, AppError::InvalidTransition { .. }));
                }
            }
        }
    }

    #[test]
    fn test_accept_escrows_total_amount() {
        let t = transition(BookingStatus::Pending, BookingAction::Accept { notes: None });
        assert_eq!(t.to, BookingStatus::Accepted);
        assert_eq!(t.ledger, LedgerOp::Escrow(500));
        assert!(t.updated.responded_at.is_some());
    }

    #[test]
    fn test_counter_keeps_total_and_records_offer() {
        let t = transition(
            BookingStatus::Pending,
            BookingAction::Counter {
                amount: 700,
                notes: Some("two sets".to_string()),
            },
        );
        assert_eq!(t.ledger, LedgerOp::None);
        assert_eq!(t.updated.total_amount, 500);
        assert_eq!(t.updated.counter_amount, Some(700));
        assert_eq!(t.updated.counter_notes.as_deref(), Some("two sets"));
    }

    #[test]
    fn test_accept_counter_folds_offer_into_total() {
        let t = transition(BookingStatus::Counter, BookingAction::AcceptCounter);
        assert_eq!(t.ledger, LedgerOp::Escrow(700));
        assert_eq!(t.updated.total_amount, 700);
        assert_eq!(t.updated.counter_amount, None);
        assert_eq!(t.to, BookingStatus::Accepted);
    }

    #[test]
    fn test_cancel_refunds_only_when_escrowed() {
        for status in [BookingStatus::Pending, BookingStatus::Counter] {
            let t = transition(status, BookingAction::Cancel { reason: None });
            assert_eq!(t.ledger, LedgerOp::None, "cancel from {status}");
            assert_eq!(t.updated.counter_amount, None);
        }
        for status in [BookingStatus::Accepted, BookingStatus::Confirmed] {
            let t = transition(
                status,
                BookingAction::Cancel {
                    reason: Some("venue closed".to_string()),
                },
            );
            assert_eq!(t.ledger, LedgerOp::Refund(500), "cancel from {status}");
            assert_eq!(t.updated.cancelled_by.as_deref(), Some("provider-1"));
            assert_eq!(t.updated.cancellation_reason.as_deref(), Some("venue closed"));
            assert!(t.updated.cancelled_at.is_some());
        }
    }

    #[test]
    fn test_complete_and_no_show_both_pay_out() {
        let done = transition(BookingStatus::Confirmed, BookingAction::Complete);
        let absent = transition(BookingStatus::Confirmed, BookingAction::NoShow);
        assert_eq!(done.ledger, LedgerOp::Payout(500));
        assert_eq!(absent.ledger, LedgerOp::Payout(500));
        assert_eq!(done.to, BookingStatus::Completed);
        assert_eq!(absent.to, BookingStatus::NoShow);
    }

    #[test]
    fn test_replay_is_already_applied() {
        assert!(matches!(
            plan_for(BookingStatus::Completed, &BookingAction::Complete).unwrap(),
            Plan::AlreadyApplied
        ));
        assert!(matches!(
            plan_for(
                BookingStatus::Accepted,
                &BookingAction::Accept { notes: None }
            )
            .unwrap(),
            Plan::AlreadyApplied
        ));
    }

    #[test]
    fn test_second_counter_with_new_amount_rejected() {
        let err = plan_for(
            BookingStatus::Counter,
            &BookingAction::Counter {
                amount: 900,
                notes: None,
            },
        )
        .unwrap_err();
        assert!(matches!(
            err,
            AppError::InvalidTransition {
                action: "counter",
                status: BookingStatus::Counter
            }
        ));
    }

    #[test]
    fn test_auto_decline_has_no_ledger_effect() {
        let now = chrono::Utc::now().naive_utc();
        let t = auto_decline(&booking(BookingStatus::Pending), now);
        assert_eq!(t.from, BookingStatus::Pending);
        assert_eq!(t.to, BookingStatus::Declined);
        assert_eq!(t.ledger, LedgerOp::None);
        assert_eq!(t.updated.responded_at, Some(now));
    }
}
