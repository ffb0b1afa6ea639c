use std::sync::Mutex;

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::db::{self, queries};
use crate::errors::AppError;
use crate::models::{Actor, Booking, BookingAction, BookingStatus, LedgerMetadata, OutboxMessage};
use crate::services::ledger::{self, LedgerError};
use crate::services::machine::{self, LedgerOp, Plan, Transition};
use crate::services::{events, guard};

#[derive(Debug)]
pub enum ActionOutcome {
    Applied { booking: Booking, message: String },
    /// Retry of an action whose effect is already in place; nothing was written.
    Unchanged { booking: Booking, message: String },
    /// `accept` could not be funded, so the booking was declined instead.
    AutoDeclined {
        booking: Booking,
        required: i64,
        available: i64,
    },
}

impl ActionOutcome {
    pub fn booking(&self) -> &Booking {
        match self {
            ActionOutcome::Applied { booking, .. }
            | ActionOutcome::Unchanged { booking, .. }
            | ActionOutcome::AutoDeclined { booking, .. } => booking,
        }
    }

    pub fn recorded_events(&self) -> bool {
        !matches!(self, ActionOutcome::Unchanged { .. })
    }
}

pub fn get_booking(db: &Mutex<Connection>, actor: &Actor, booking_id: &str) -> Result<Booking, AppError> {
    let booking = load(db, booking_id)?;
    guard::authorize_view(actor, &booking)?;
    Ok(booking.redacted())
}

/// Runs one negotiation step: authorize, plan against the status as read, then
/// re-check that status and apply ledger, booking row, history and outbox
/// writes in a single transaction.
pub fn perform_action(
    db: &Mutex<Connection>,
    actor: &Actor,
    booking_id: &str,
    action: BookingAction,
) -> Result<ActionOutcome, AppError> {
    let booking = load(db, booking_id)?;
    let roles = guard::authorize(actor, &booking, &action)?;

    let transition = match machine::plan(&booking, &action, actor, queries::now())? {
        Plan::AlreadyApplied => {
            tracing::info!(
                booking_id = %booking.id,
                action = action.name(),
                status = %booking.status,
                "action already applied, nothing to do"
            );
            let message = format!("Booking is already {}", booking.status);
            return Ok(ActionOutcome::Unchanged {
                booking: booking.redacted(),
                message,
            });
        }
        Plan::Apply(transition) => transition,
    };

    if roles.admin && !roles.is_party() {
        tracing::info!(
            admin_id = %actor.id,
            booking_id = %booking.id,
            action = action.name(),
            "administrative override"
        );
    }

    let mut conn = db::lock(db)?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    ensure_status(&tx, &booking.id, transition.from)?;

    match run_ledger(&tx, &booking, &transition, actor) {
        Ok(()) => {}
        Err(LedgerError::InsufficientFunds {
            required,
            available,
        }) if matches!(action, BookingAction::Accept { .. }) => {
            let declined = machine::auto_decline(&booking, queries::now());
            write_transition(&tx, &declined, "auto_decline", actor)?;
            write_outbox(&tx, &events::for_auto_decline(&declined.updated, actor, required, available))?;
            tx.commit()?;

            tracing::warn!(
                booking_id = %booking.id,
                client_id = %booking.client_id,
                required,
                available,
                "accept could not be funded, booking auto-declined"
            );
            return Ok(ActionOutcome::AutoDeclined {
                booking: declined.updated.redacted(),
                required,
                available,
            });
        }
        Err(e) => {
            tracing::warn!(booking_id = %booking.id, action = action.name(), error = %e, "ledger step failed");
            return Err(e.into());
        }
    }

    write_transition(&tx, &transition, action.name(), actor)?;
    write_outbox(&tx, &events::for_transition(&transition, &action, actor))?;
    tx.commit()?;

    tracing::info!(
        booking_id = %booking.id,
        actor_id = %actor.id,
        action = action.name(),
        from = %transition.from,
        to = %transition.to,
        "booking transitioned"
    );

    Ok(ActionOutcome::Applied {
        message: success_message(&action),
        booking: transition.updated.redacted(),
    })
}

/// Removes a booking that nobody has responded to yet. Never touches the ledger.
pub fn delete_booking(db: &Mutex<Connection>, actor: &Actor, booking_id: &str) -> Result<(), AppError> {
    let booking = load(db, booking_id)?;
    guard::authorize_delete(actor, &booking)?;

    if booking.status != BookingStatus::Pending {
        return Err(AppError::InvalidTransition {
            action: "delete",
            status: booking.status,
        });
    }

    let conn = db::lock(db)?;
    if !queries::delete_pending_booking(&conn, booking_id)? {
        return match queries::get_booking_status(&conn, booking_id)? {
            None => Err(AppError::NotFound(format!("booking {booking_id}"))),
            Some(status) => Err(AppError::Conflict(format!(
                "booking changed to {status} before it could be deleted"
            ))),
        };
    }

    tracing::info!(booking_id = %booking_id, actor_id = %actor.id, "pending booking deleted");
    Ok(())
}

fn load(db: &Mutex<Connection>, booking_id: &str) -> Result<Booking, AppError> {
    let conn = db::lock(db)?;
    queries::get_booking_by_id(&conn, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))
}

fn ensure_status(tx: &Transaction<'_>, booking_id: &str, observed: BookingStatus) -> Result<(), AppError> {
    let current = queries::get_booking_status(tx, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;

    if current != observed {
        tracing::warn!(
            booking_id = %booking_id,
            observed = %observed,
            current = %current,
            "booking changed since it was read"
        );
        return Err(AppError::Conflict(format!(
            "booking is now {current}, expected {observed}"
        )));
    }
    Ok(())
}

fn run_ledger(
    tx: &Transaction<'_>,
    booking: &Booking,
    transition: &Transition,
    actor: &Actor,
) -> Result<(), LedgerError> {
    match transition.ledger {
        LedgerOp::None => {}
        LedgerOp::Escrow(amount) => {
            let meta = LedgerMetadata::for_booking(&booking.id, &booking.provider_id, &actor.id);
            ledger::escrow(tx, &booking.client_id, amount, meta)?;
        }
        LedgerOp::Payout(amount) => {
            let meta = LedgerMetadata::for_booking(&booking.id, &booking.client_id, &actor.id);
            ledger::payout(tx, &booking.provider_id, amount, meta)?;
        }
        LedgerOp::Refund(amount) => {
            let meta = LedgerMetadata::for_booking(&booking.id, &booking.provider_id, &actor.id);
            ledger::refund(tx, &booking.client_id, amount, meta)?;
        }
    }
    Ok(())
}

fn write_transition(
    tx: &Transaction<'_>,
    transition: &Transition,
    action: &str,
    actor: &Actor,
) -> Result<(), AppError> {
    let booking = &transition.updated;
    if !queries::update_booking_if_status(tx, booking, transition.from)? {
        return Err(AppError::Conflict(format!(
            "booking {} is no longer {}",
            booking.id, transition.from
        )));
    }
    queries::insert_history(tx, &booking.id, transition.from, transition.to, action, &actor.id)?;
    Ok(())
}

fn write_outbox(tx: &Transaction<'_>, messages: &[OutboxMessage]) -> Result<(), AppError> {
    for message in messages {
        queries::insert_outbox(tx, message)?;
    }
    Ok(())
}

fn success_message(action: &BookingAction) -> String {
    match action {
        BookingAction::Accept { .. } => "Booking accepted",
        BookingAction::Decline { .. } => "Booking declined",
        BookingAction::Counter { .. } => "Counter-offer sent",
        BookingAction::AcceptCounter => "Counter-offer accepted",
        BookingAction::Confirm => "Booking confirmed",
        BookingAction::Cancel { .. } => "Booking cancelled",
        BookingAction::Complete => "Booking completed",
        BookingAction::NoShow => "Booking marked as no-show",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LedgerAction, ServiceType};

    fn setup() -> Mutex<Connection> {
        Mutex::new(db::init_db(":memory:").unwrap())
    }

    fn seed(db: &Mutex<Connection>, total: i64, client_coins: i64) {
        let now = queries::now();
        let booking = Booking {
            id: "bk-1".to_string(),
            booking_number: "BK-0001".to_string(),
            client_id: "client-1".to_string(),
            provider_id: "provider-1".to_string(),
            service_type: ServiceType::Performance,
            event_date: now,
            total_amount: total,
            counter_amount: None,
            client_notes: None,
            response_notes: None,
            counter_notes: None,
            status: BookingStatus::Pending,
            responded_at: None,
            confirmed_at: None,
            completed_at: None,
            cancelled_at: None,
            cancelled_by: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        };
        let mut conn = db.lock().unwrap();
        queries::insert_booking(&conn, &booking).unwrap();
        if client_coins > 0 {
            ledger::deposit(&mut conn, "client-1", client_coins, None, "payments").unwrap();
        }
    }

    fn provider() -> Actor {
        Actor::user("provider-1")
    }

    fn client() -> Actor {
        Actor::user("client-1")
    }

    fn balance(db: &Mutex<Connection>, actor: &str) -> i64 {
        queries::get_balance(&db.lock().unwrap(), actor).unwrap()
    }

    fn booking_entries(db: &Mutex<Connection>) -> Vec<LedgerAction> {
        queries::get_ledger_entries_for_booking(&db.lock().unwrap(), "bk-1")
            .unwrap()
            .into_iter()
            .map(|e| e.action)
            .collect()
    }

    #[test]
    fn test_full_happy_path() {
        let db = setup();
        seed(&db, 500, 1000);

        perform_action(&db, &provider(), "bk-1", BookingAction::Accept { notes: None }).unwrap();
        assert_eq!(balance(&db, "client-1"), 500);
        perform_action(&db, &client(), "bk-1", BookingAction::Confirm).unwrap();
        let outcome = perform_action(&db, &provider(), "bk-1", BookingAction::Complete).unwrap();

        assert_eq!(outcome.booking().status, BookingStatus::Completed);
        assert_eq!(balance(&db, "provider-1"), 500);
        assert_eq!(
            booking_entries(&db),
            vec![LedgerAction::BookingEscrow, LedgerAction::BookingPayment]
        );

        let history = queries::get_history(&db.lock().unwrap(), "bk-1").unwrap();
        let steps: Vec<&str> = history.iter().map(|h| h.to_status.as_str()).collect();
        assert_eq!(steps, vec!["accepted", "confirmed", "completed"]);
    }

    #[test]
    fn test_accept_without_funds_auto_declines() {
        let db = setup();
        seed(&db, 500, 300);

        let outcome =
            perform_action(&db, &provider(), "bk-1", BookingAction::Accept { notes: None }).unwrap();
        match outcome {
            ActionOutcome::AutoDeclined {
                booking,
                required,
                available,
            } => {
                assert_eq!(booking.status, BookingStatus::Declined);
                assert_eq!((required, available), (500, 300));
            }
            other => panic!("expected auto-decline, got {other:?}"),
        }
        assert_eq!(balance(&db, "client-1"), 300);
        assert!(booking_entries(&db).is_empty());

        let conn = db.lock().unwrap();
        let history = queries::get_history(&conn, "bk-1").unwrap();
        assert_eq!(history[0].action, "auto_decline");
        match queries::get_outbox_messages(&conn).unwrap().as_slice() {
            [OutboxMessage::Notification(event)] => {
                assert_eq!(event.kind, "booking_declined_insufficient_funds");
            }
            other => panic!("expected one notification, got {other:?}"),
        }
    }

    #[test]
    fn test_accept_counter_without_funds_changes_nothing() {
        let db = setup();
        seed(&db, 500, 600);

        perform_action(
            &db,
            &provider(),
            "bk-1",
            BookingAction::Counter {
                amount: 700,
                notes: None,
            },
        )
        .unwrap();
        let err = perform_action(&db, &client(), "bk-1", BookingAction::AcceptCounter).unwrap_err();

        assert!(matches!(
            err,
            AppError::InsufficientFunds {
                required: 700,
                available: 600
            }
        ));
        let booking = get_booking(&db, &client(), "bk-1").unwrap();
        assert_eq!(booking.status, BookingStatus::Counter);
        assert_eq!(booking.counter_amount, Some(700));
        assert_eq!(balance(&db, "client-1"), 600);

        // only the counter-offer notification was recorded
        let messages = queries::get_outbox_messages(&db.lock().unwrap()).unwrap();
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn test_ledger_write_failure_persists_nothing() {
        let db = setup();
        seed(&db, 500, 1000);
        db.lock()
            .unwrap()
            .execute_batch(
                "CREATE TEMP TRIGGER ledger_entries_fail BEFORE INSERT ON ledger_entries
                 BEGIN SELECT RAISE(ABORT, 'disk I/O error'); END;",
            )
            .unwrap();

        let err =
            perform_action(&db, &provider(), "bk-1", BookingAction::Accept { notes: None }).unwrap_err();

        assert!(matches!(err, AppError::Ledger(_)));
        assert_eq!(err.code(), "ledger_failure");
        assert_eq!(err.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);

        let conn = db.lock().unwrap();
        assert_eq!(
            queries::get_booking_status(&conn, "bk-1").unwrap(),
            Some(BookingStatus::Pending)
        );
        assert_eq!(queries::get_balance(&conn, "client-1").unwrap(), 1000);
        assert!(queries::get_history(&conn, "bk-1").unwrap().is_empty());
        assert!(queries::get_outbox_messages(&conn).unwrap().is_empty());
        assert!(queries::find_balance_drift(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_stale_status_is_a_conflict() {
        let db = setup();
        seed(&db, 500, 1000);

        // A cancel lands between another caller's read and write.
        let snapshot = load(&db, "bk-1").unwrap();
        perform_action(&db, &client(), "bk-1", BookingAction::Cancel { reason: None }).unwrap();

        let mut conn = db.lock().unwrap();
        let tx = conn.transaction().unwrap();
        let err = ensure_status(&tx, "bk-1", snapshot.status).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn test_complete_twice_pays_once() {
        let db = setup();
        seed(&db, 500, 500);

        perform_action(&db, &provider(), "bk-1", BookingAction::Accept { notes: None }).unwrap();
        perform_action(&db, &provider(), "bk-1", BookingAction::Confirm).unwrap();
        perform_action(&db, &provider(), "bk-1", BookingAction::Complete).unwrap();
        let again = perform_action(&db, &provider(), "bk-1", BookingAction::Complete).unwrap();

        assert!(matches!(again, ActionOutcome::Unchanged { .. }));
        assert_eq!(balance(&db, "provider-1"), 500);
        assert_eq!(
            booking_entries(&db)
                .into_iter()
                .filter(|a| *a == LedgerAction::BookingPayment)
                .count(),
            1
        );
    }

    #[test]
    fn test_admin_override_is_tagged() {
        let db = setup();
        seed(&db, 500, 500);
        let admin = Actor::admin("support-9");

        perform_action(&db, &admin, "bk-1", BookingAction::Accept { notes: None }).unwrap();
        perform_action(&db, &admin, "bk-1", BookingAction::Cancel { reason: Some("dispute".to_string()) })
            .unwrap();

        let conn = db.lock().unwrap();
        let entries = queries::get_ledger_entries_for_booking(&conn, "bk-1").unwrap();
        assert!(entries.iter().all(|e| e.metadata.performed_by == "support-9"));
        let booking = queries::get_booking_by_id(&conn, "bk-1").unwrap().unwrap();
        assert_eq!(booking.cancelled_by.as_deref(), Some("support-9"));
        assert_eq!(queries::get_balance(&conn, "client-1").unwrap(), 500);
    }

    #[test]
    fn test_delete_only_while_pending() {
        let db = setup();
        seed(&db, 500, 500);

        assert!(matches!(
            delete_booking(&db, &provider(), "bk-1"),
            Err(AppError::Forbidden(_))
        ));
        perform_action(&db, &provider(), "bk-1", BookingAction::Decline { notes: None }).unwrap();
        assert!(matches!(
            delete_booking(&db, &client(), "bk-1"),
            Err(AppError::InvalidTransition { action: "delete", .. })
        ));
    }

    #[test]
    fn test_delete_pending_booking() {
        let db = setup();
        seed(&db, 500, 0);

        delete_booking(&db, &client(), "bk-1").unwrap();
        assert!(matches!(get_booking(&db, &client(), "bk-1"), Err(AppError::NotFound(_))));
        assert_eq!(queries::count_ledger_entries(&db.lock().unwrap()).unwrap(), 0);
    }
}
