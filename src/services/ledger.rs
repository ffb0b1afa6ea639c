use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{LedgerAction, LedgerEntry, LedgerMetadata};

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("insufficient coins: {required} required, {available} available")]
    InsufficientFunds { required: i64, available: i64 },

    #[error("invalid ledger amount: {0}")]
    InvalidAmount(i64),

    #[error("ledger write failed: {0}")]
    Storage(#[from] anyhow::Error),
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientFunds {
                required,
                available,
            } => AppError::InsufficientFunds {
                required,
                available,
            },
            other => AppError::Ledger(other.to_string()),
        }
    }
}

/// Moves `delta` coins on `actor_id` and appends the matching entry. Both
/// writes land in `tx`, so they commit or roll back together. Debits never
/// take a balance below zero and credits never past `i64::MAX`.
pub fn apply(
    tx: &Transaction<'_>,
    actor_id: &str,
    delta: i64,
    action: LedgerAction,
    metadata: LedgerMetadata,
) -> Result<LedgerEntry, LedgerError> {
    if delta < 0 {
        let required = delta.checked_neg().ok_or(LedgerError::InvalidAmount(delta))?;
        if !queries::debit_balance_if_covered(tx, actor_id, required)? {
            let available = queries::get_balance(tx, actor_id)?;
            return Err(LedgerError::InsufficientFunds {
                required,
                available,
            });
        }
    } else {
        let current = queries::get_balance(tx, actor_id)?;
        if current.checked_add(delta).is_none() {
            tracing::warn!(actor_id = %actor_id, amount = delta, "credit would overflow balance");
            return Err(LedgerError::InvalidAmount(delta));
        }
        queries::credit_balance(tx, actor_id, delta)?;
    }

    let entry = LedgerEntry {
        id: uuid::Uuid::new_v4().to_string(),
        actor_id: actor_id.to_string(),
        amount: delta,
        action,
        metadata,
        created_at: queries::now(),
    };
    queries::insert_ledger_entry(tx, &entry)?;

    tracing::info!(
        actor_id = %actor_id,
        amount = delta,
        action = entry.action.as_str(),
        booking_id = entry.metadata.booking_id.as_deref().unwrap_or("-"),
        performed_by = %entry.metadata.performed_by,
        "ledger entry applied"
    );

    Ok(entry)
}

/// Holds `amount` of the client's coins against a booking. Fails closed.
pub fn escrow(
    tx: &Transaction<'_>,
    client_id: &str,
    amount: i64,
    metadata: LedgerMetadata,
) -> Result<LedgerEntry, LedgerError> {
    ensure_non_negative(amount)?;
    apply(tx, client_id, -amount, LedgerAction::BookingEscrow, metadata)
}

pub fn payout(
    tx: &Transaction<'_>,
    provider_id: &str,
    amount: i64,
    metadata: LedgerMetadata,
) -> Result<LedgerEntry, LedgerError> {
    ensure_non_negative(amount)?;
    apply(tx, provider_id, amount, LedgerAction::BookingPayment, metadata)
}

pub fn refund(
    tx: &Transaction<'_>,
    client_id: &str,
    amount: i64,
    metadata: LedgerMetadata,
) -> Result<LedgerEntry, LedgerError> {
    ensure_non_negative(amount)?;
    apply(tx, client_id, amount, LedgerAction::BookingRefund, metadata)
}

/// Credits coins captured by the external payment collaborator.
pub fn deposit(
    conn: &mut Connection,
    actor_id: &str,
    amount: i64,
    reference: Option<String>,
    performed_by: &str,
) -> Result<LedgerEntry, LedgerError> {
    if amount <= 0 {
        return Err(LedgerError::InvalidAmount(amount));
    }

    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(anyhow::Error::from)?;
    let metadata = LedgerMetadata {
        booking_id: None,
        counterpart_id: None,
        performed_by: performed_by.to_string(),
        reference,
    };
    let entry = apply(&tx, actor_id, amount, LedgerAction::CoinTopup, metadata)?;
    tx.commit().map_err(anyhow::Error::from)?;

    Ok(entry)
}

fn ensure_non_negative(amount: i64) -> Result<(), LedgerError> {
    if amount < 0 {
        return Err(LedgerError::InvalidAmount(amount));
    }
    Ok(())
}
