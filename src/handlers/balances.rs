use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::auth::{authenticate, require_admin};
use crate::models::LedgerEntry;
use crate::services::ledger;
use crate::state::AppState;

#[derive(Serialize)]
pub struct BalanceResponse {
    actor_id: String,
    balance: i64,
}

// GET /api/balances/:actor_id
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(actor_id): Path<String>,
) -> Result<Json<BalanceResponse>, AppError> {
    let actor = authenticate(&headers, &state.config)?;
    if actor.id != actor_id {
        require_admin(&actor)?;
    }

    let balance = {
        let conn = state.conn()?;
        queries::get_balance(&conn, &actor_id)?
    };

    Ok(Json(BalanceResponse { actor_id, balance }))
}

#[derive(Deserialize)]
pub struct DepositRequest {
    pub amount: i64,
    pub reference: Option<String>,
}

// POST /api/balances/:actor_id/deposit
pub async fn deposit(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(actor_id): Path<String>,
    body: Result<Json<DepositRequest>, JsonRejection>,
) -> Result<Json<LedgerEntry>, AppError> {
    let actor = authenticate(&headers, &state.config)?;
    require_admin(&actor)?;
    let Json(body) = body?;

    if body.amount <= 0 {
        return Err(AppError::BadRequest("amount must be positive".to_string()));
    }

    let entry = {
        let mut conn = state.conn()?;
        ledger::deposit(&mut conn, &actor_id, body.amount, body.reference, &actor.id)?
    };

    Ok(Json(entry))
}

// GET /api/admin/ledger/drift
pub async fn get_drift(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<queries::BalanceDrift>>, AppError> {
    let actor = authenticate(&headers, &state.config)?;
    require_admin(&actor)?;

    let drift = {
        let conn = state.conn()?;
        queries::find_balance_drift(&conn)?
    };

    if !drift.is_empty() {
        tracing::error!(actors = drift.len(), "balances disagree with ledger");
    }

    Ok(Json(drift))
}
