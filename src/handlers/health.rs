use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::db::queries;
use crate::state::AppState;

// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let max_attempts = state.config.outbox_max_attempts;
    let (pending_events, failed_events) = match state.conn() {
        Ok(conn) => (
            queries::count_pending_outbox(&conn, max_attempts).ok(),
            queries::count_failed_outbox(&conn, max_attempts).ok(),
        ),
        Err(_) => (None, None),
    };

    Json(serde_json::json!({
        "status": "ok",
        "pending_events": pending_events,
        "failed_events": failed_events,
    }))
}
