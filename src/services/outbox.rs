//! Delivery of events recorded alongside booking transitions.
//!
//! Rows are written in the same transaction as the status and ledger change
//! they describe, then delivered here after commit. A failed delivery only
//! bumps the row's attempt count; it is retried on a later pass until
//! `outbox_max_attempts` is reached.

use std::sync::Arc;
use std::time::Duration;

use crate::db::queries;
use crate::models::{EmailRequest, EmailTrigger, OutboxMessage};
use crate::state::AppState;

const BATCH_SIZE: i64 = 100;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

pub async fn dispatch_pending(state: &AppState) -> anyhow::Result<DispatchReport> {
    let rows = {
        let conn = state.conn()?;
        queries::get_pending_outbox(&conn, state.config.outbox_max_attempts, BATCH_SIZE)?
    };

    let mut report = DispatchReport::default();

    for row in rows {
        let result = match OutboxMessage::from_parts(&row.kind, &row.payload) {
            Ok(message) => deliver(state, &message).await,
            Err(e) => Err(e),
        };

        let conn = state.conn()?;
        match result {
            Ok(()) => {
                queries::mark_outbox_dispatched(&conn, row.id)?;
                report.delivered += 1;
            }
            Err(e) => {
                tracing::warn!(
                    outbox_id = row.id,
                    kind = %row.kind,
                    attempt = row.attempts + 1,
                    error = %e,
                    "outbox delivery failed"
                );
                queries::record_outbox_failure(&conn, row.id, &format!("{e:#}"))?;
                report.failed += 1;
            }
        }
    }

    if report.delivered + report.failed > 0 {
        tracing::debug!(
            delivered = report.delivered,
            failed = report.failed,
            "outbox pass finished"
        );
    }

    Ok(report)
}

async fn deliver(state: &AppState, message: &OutboxMessage) -> anyhow::Result<()> {
    match message {
        OutboxMessage::Notification(event) => state.notifier.notify(event).await,
        OutboxMessage::Email(request) => {
            let trigger = resolve_email(state, request).await?;
            state.mailer.send(request.template, &trigger).await
        }
    }
}

async fn resolve_email(state: &AppState, request: &EmailRequest) -> anyhow::Result<EmailTrigger> {
    let recipient = state
        .directory
        .contact(&request.recipient_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("no contact for actor {}", request.recipient_id))?;
    let provider = state
        .directory
        .contact(&request.provider_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("no contact for actor {}", request.provider_id))?;

    Ok(EmailTrigger {
        recipient_email: recipient.email,
        recipient_name: recipient.name,
        provider_name: provider.name,
        service_type: request.service_type.clone(),
        event_date: request.event_date.clone(),
        total_amount: request.total_amount,
        booking_number: request.booking_number.clone(),
        reason: request.reason.clone(),
    })
}

/// Delivers pending rows whenever a commit signals new events, and on a timer
/// so failed rows get retried.
pub async fn run_dispatcher(state: Arc<AppState>) {
    let interval = Duration::from_secs(state.config.outbox_poll_secs.max(1));
    loop {
        tokio::select! {
            _ = state.outbox_signal.notified() => {}
            _ = tokio::time::sleep(interval) => {}
        }

        if let Err(e) = dispatch_pending(&state).await {
            tracing::error!(error = %e, "outbox dispatch pass failed");
        }
        if let Err(e) = prune_delivered(&state) {
            tracing::error!(error = %e, "outbox prune failed");
        }
    }
}

/// Drops delivered rows older than `outbox_retention_hours`.
pub fn prune_delivered(state: &AppState) -> anyhow::Result<usize> {
    let cutoff = queries::now() - chrono::Duration::hours(state.config.outbox_retention_hours.max(0));
    let conn = state.conn()?;
    let deleted = queries::prune_dispatched_outbox(&conn, &cutoff)?;
    if deleted > 0 {
        tracing::debug!(deleted, "pruned delivered outbox rows");
    }
    Ok(deleted)
}
