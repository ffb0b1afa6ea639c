use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{
    Booking, BookingStatus, LedgerAction, LedgerEntry, LedgerMetadata, OutboxMessage, ServiceType,
};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

fn fmt_ts(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn fmt_opt_ts(ts: &Option<NaiveDateTime>) -> Option<String> {
    ts.as_ref().map(fmt_ts)
}

fn parse_ts(s: &str) -> anyhow::Result<NaiveDateTime> {
    Ok(NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)?)
}

fn parse_opt_ts(s: Option<String>) -> anyhow::Result<Option<NaiveDateTime>> {
    s.as_deref().map(parse_ts).transpose()
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "id, booking_number, client_id, provider_id, service_type, event_date, \
     total_amount, counter_amount, client_notes, response_notes, counter_notes, status, \
     responded_at, confirmed_at, completed_at, cancelled_at, cancelled_by, cancellation_reason, \
     created_at, updated_at";

pub fn insert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO bookings ({BOOKING_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)"
        ),
        params![
            booking.id,
            booking.booking_number,
            booking.client_id,
            booking.provider_id,
            booking.service_type.as_str(),
            fmt_ts(&booking.event_date),
            booking.total_amount,
            booking.counter_amount,
            booking.client_notes,
            booking.response_notes,
            booking.counter_notes,
            booking.status.as_str(),
            fmt_opt_ts(&booking.responded_at),
            fmt_opt_ts(&booking.confirmed_at),
            fmt_opt_ts(&booking.completed_at),
            fmt_opt_ts(&booking.cancelled_at),
            booking.cancelled_by,
            booking.cancellation_reason,
            fmt_ts(&booking.created_at),
            fmt_ts(&booking.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
        params![id],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_booking_status(conn: &Connection, id: &str) -> anyhow::Result<Option<BookingStatus>> {
    let status: Option<String> = conn
        .query_row(
            "SELECT status FROM bookings WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;

    status
        .map(|s| {
            BookingStatus::parse(&s)
                .ok_or_else(|| anyhow::anyhow!("unknown booking status in storage: {s}"))
        })
        .transpose()
}

/// Writes every mutable column of `booking`, but only if the stored status is
/// still `expected`. Returns false when the guard did not match.
pub fn update_booking_if_status(
    conn: &Connection,
    booking: &Booking,
    expected: BookingStatus,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET
           total_amount = ?1,
           counter_amount = ?2,
           response_notes = ?3,
           counter_notes = ?4,
           status = ?5,
           responded_at = ?6,
           confirmed_at = ?7,
           completed_at = ?8,
           cancelled_at = ?9,
           cancelled_by = ?10,
           cancellation_reason = ?11,
           updated_at = ?12
         WHERE id = ?13 AND status = ?14",
        params![
            booking.total_amount,
            booking.counter_amount,
            booking.response_notes,
            booking.counter_notes,
            booking.status.as_str(),
            fmt_opt_ts(&booking.responded_at),
            fmt_opt_ts(&booking.confirmed_at),
            fmt_opt_ts(&booking.completed_at),
            fmt_opt_ts(&booking.cancelled_at),
            booking.cancelled_by,
            booking.cancellation_reason,
            fmt_ts(&booking.updated_at),
            booking.id,
            expected.as_str(),
        ],
    )?;
    Ok(count > 0)
}

pub fn delete_pending_booking(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute(
        "DELETE FROM bookings WHERE id = ?1 AND status = 'pending'",
        params![id],
    )?;
    Ok(count > 0)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let service_type: String = row.get(4)?;
    let event_date: String = row.get(5)?;
    let status_str: String = row.get(11)?;
    let created_at: String = row.get(18)?;
    let updated_at: String = row.get(19)?;

    let status = BookingStatus::parse(&status_str)
        .ok_or_else(|| anyhow::anyhow!("unknown booking status in storage: {status_str}"))?;

    Ok(Booking {
        id: row.get(0)?,
        booking_number: row.get(1)?,
        client_id: row.get(2)?,
        provider_id: row.get(3)?,
        service_type: ServiceType::parse(&service_type),
        event_date: parse_ts(&event_date)?,
        total_amount: row.get(6)?,
        counter_amount: row.get(7)?,
        client_notes: row.get(8)?,
        response_notes: row.get(9)?,
        counter_notes: row.get(10)?,
        status,
        responded_at: parse_opt_ts(row.get(12)?)?,
        confirmed_at: parse_opt_ts(row.get(13)?)?,
        completed_at: parse_opt_ts(row.get(14)?)?,
        cancelled_at: parse_opt_ts(row.get(15)?)?,
        cancelled_by: row.get(16)?,
        cancellation_reason: row.get(17)?,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

// ── Booking History ──

pub struct HistoryEntry {
    pub from_status: String,
    pub to_status: String,
    pub action: String,
    pub actor_id: String,
    pub created_at: String,
}

pub fn insert_history(
    conn: &Connection,
    booking_id: &str,
    from: BookingStatus,
    to: BookingStatus,
    action: &str,
    actor_id: &str,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO booking_history (booking_id, from_status, to_status, action, actor_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            booking_id,
            from.as_str(),
            to.as_str(),
            action,
            actor_id,
            fmt_ts(&now())
        ],
    )?;
    Ok(())
}

pub fn get_history(conn: &Connection, booking_id: &str) -> anyhow::Result<Vec<HistoryEntry>> {
    let mut stmt = conn.prepare(
        "SELECT from_status, to_status, action, actor_id, created_at
         FROM booking_history WHERE booking_id = ?1 ORDER BY id ASC",
    )?;

    let rows = stmt.query_map(params![booking_id], |row| {
        Ok(HistoryEntry {
            from_status: row.get(0)?,
            to_status: row.get(1)?,
            action: row.get(2)?,
            actor_id: row.get(3)?,
            created_at: row.get(4)?,
        })
    })?;

    let mut history = vec![];
    for row in rows {
        history.push(row?);
    }
    Ok(history)
}

// ── Balances ──

pub fn get_balance(conn: &Connection, actor_id: &str) -> anyhow::Result<i64> {
    let coins: Option<i64> = conn
        .query_row(
            "SELECT coins FROM balances WHERE actor_id = ?1",
            params![actor_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(coins.unwrap_or(0))
}

pub fn credit_balance(conn: &Connection, actor_id: &str, amount: i64) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO balances (actor_id, coins, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(actor_id) DO UPDATE SET
           coins = coins + excluded.coins,
           updated_at = excluded.updated_at",
        params![actor_id, amount, fmt_ts(&now())],
    )?;
    Ok(())
}

/// Debits only when the balance covers `amount`. Returns false otherwise,
/// leaving the balance untouched.
pub fn debit_balance_if_covered(
    conn: &Connection,
    actor_id: &str,
    amount: i64,
) -> anyhow::Result<bool> {
    if amount == 0 {
        credit_balance(conn, actor_id, 0)?;
        return Ok(true);
    }

    let count = conn.execute(
        "UPDATE balances SET coins = coins - ?1, updated_at = ?2
         WHERE actor_id = ?3 AND coins >= ?1",
        params![amount, fmt_ts(&now()), actor_id],
    )?;
    Ok(count > 0)
}

// ── Ledger ──

const LEDGER_COLUMNS: &str = "id, actor_id, amount, action, metadata, created_at";

pub fn insert_ledger_entry(conn: &Connection, entry: &LedgerEntry) -> anyhow::Result<()> {
    conn.execute(
        &format!("INSERT INTO ledger_entries ({LEDGER_COLUMNS}, booking_id) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
        params![
            entry.id,
            entry.actor_id,
            entry.amount,
            entry.action.as_str(),
            serde_json::to_string(&entry.metadata)?,
            fmt_ts(&entry.created_at),
            entry.metadata.booking_id,
        ],
    )?;
    Ok(())
}

pub fn get_ledger_entries_for_booking(
    conn: &Connection,
    booking_id: &str,
) -> anyhow::Result<Vec<LedgerEntry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {LEDGER_COLUMNS} FROM ledger_entries WHERE booking_id = ?1 ORDER BY rowid ASC"
    ))?;

    let rows = stmt.query_map(params![booking_id], |row| Ok(parse_ledger_row(row)))?;

    let mut entries = vec![];
    for row in rows {
        entries.push(row??);
    }
    Ok(entries)
}

pub fn get_ledger_entries_for_actor(
    conn: &Connection,
    actor_id: &str,
) -> anyhow::Result<Vec<LedgerEntry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {LEDGER_COLUMNS} FROM ledger_entries WHERE actor_id = ?1 ORDER BY rowid ASC"
    ))?;

    let rows = stmt.query_map(params![actor_id], |row| Ok(parse_ledger_row(row)))?;

    let mut entries = vec![];
    for row in rows {
        entries.push(row??);
    }
    Ok(entries)
}

pub fn count_ledger_entries(conn: &Connection) -> anyhow::Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM ledger_entries", [], |row| row.get(0))?;
    Ok(count)
}

fn parse_ledger_row(row: &rusqlite::Row) -> anyhow::Result<LedgerEntry> {
    let action_str: String = row.get(3)?;
    let metadata_json: String = row.get(4)?;
    let created_at: String = row.get(5)?;

    let action = LedgerAction::parse(&action_str)
        .ok_or_else(|| anyhow::anyhow!("unknown ledger action in storage: {action_str}"))?;
    let metadata: LedgerMetadata = serde_json::from_str(&metadata_json)?;

    Ok(LedgerEntry {
        id: row.get(0)?,
        actor_id: row.get(1)?,
        amount: row.get(2)?,
        action,
        metadata,
        created_at: parse_ts(&created_at)?,
    })
}

#[derive(Debug, serde::Serialize)]
pub struct BalanceDrift {
    pub actor_id: String,
    pub balance: i64,
    pub ledger_sum: i64,
}

/// Actors whose stored balance differs from the sum of their ledger entries.
pub fn find_balance_drift(conn: &Connection) -> anyhow::Result<Vec<BalanceDrift>> {
    let mut stmt = conn.prepare(
        "SELECT actor_id, SUM(balance), SUM(ledger_sum) FROM (
             SELECT actor_id, coins AS balance, 0 AS ledger_sum FROM balances
             UNION ALL
             SELECT actor_id, 0 AS balance, amount AS ledger_sum FROM ledger_entries
         )
         GROUP BY actor_id
         HAVING SUM(balance) != SUM(ledger_sum)
         ORDER BY actor_id",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok(BalanceDrift {
            actor_id: row.get(0)?,
            balance: row.get(1)?,
            ledger_sum: row.get(2)?,
        })
    })?;

    let mut drift = vec![];
    for row in rows {
        drift.push(row?);
    }
    Ok(drift)
}

// ── Outbox ──

pub struct OutboxRow {
    pub id: i64,
    pub kind: String,
    pub payload: String,
    pub attempts: i64,
}

pub fn insert_outbox(conn: &Connection, message: &OutboxMessage) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO outbox (kind, payload, created_at) VALUES (?1, ?2, ?3)",
        params![message.kind(), message.to_payload()?, fmt_ts(&now())],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_pending_outbox(
    conn: &Connection,
    max_attempts: i64,
    limit: i64,
) -> anyhow::Result<Vec<OutboxRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, kind, payload, attempts FROM outbox
         WHERE dispatched_at IS NULL AND attempts < ?1
         ORDER BY id ASC LIMIT ?2",
    )?;

    let rows = stmt.query_map(params![max_attempts, limit], |row| {
        Ok(OutboxRow {
            id: row.get(0)?,
            kind: row.get(1)?,
            payload: row.get(2)?,
            attempts: row.get(3)?,
        })
    })?;

    let mut pending = vec![];
    for row in rows {
        pending.push(row?);
    }
    Ok(pending)
}

pub fn mark_outbox_dispatched(conn: &Connection, id: i64) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE outbox SET dispatched_at = ?1, attempts = attempts + 1, last_error = NULL WHERE id = ?2",
        params![fmt_ts(&now()), id],
    )?;
    Ok(())
}

pub fn record_outbox_failure(conn: &Connection, id: i64, error: &str) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE outbox SET attempts = attempts + 1, last_error = ?1 WHERE id = ?2",
        params![error, id],
    )?;
    Ok(())
}

/// Undelivered rows the dispatcher will still retry.
pub fn count_pending_outbox(conn: &Connection, max_attempts: i64) -> anyhow::Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM outbox WHERE dispatched_at IS NULL AND attempts < ?1",
        params![max_attempts],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Undelivered rows that used up their attempts and are no longer retried.
pub fn count_failed_outbox(conn: &Connection, max_attempts: i64) -> anyhow::Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM outbox WHERE dispatched_at IS NULL AND attempts >= ?1",
        params![max_attempts],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Deletes delivered rows dispatched before `before`. Failed rows are kept.
pub fn prune_dispatched_outbox(conn: &Connection, before: &NaiveDateTime) -> anyhow::Result<usize> {
    let deleted = conn.execute(
        "DELETE FROM outbox WHERE dispatched_at IS NOT NULL AND dispatched_at < ?1",
        params![fmt_ts(before)],
    )?;
    Ok(deleted)
}

pub fn get_outbox_messages(conn: &Connection) -> anyhow::Result<Vec<OutboxMessage>> {
    let mut stmt = conn.prepare("SELECT kind, payload FROM outbox ORDER BY id ASC")?;
    let rows = stmt.query_map([], |row| {
        let kind: String = row.get(0)?;
        let payload: String = row.get(1)?;
        Ok(OutboxMessage::from_parts(&kind, &payload))
    })?;

    let mut messages = vec![];
    for row in rows {
        messages.push(row??);
    }
    Ok(messages)
}
