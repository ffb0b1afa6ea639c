use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::errors::AppError;
use crate::handlers::auth::authenticate;
use crate::models::{ActionRequest, Booking, BookingAction};
use crate::services::bookings::{self, ActionOutcome};
use crate::state::AppState;

#[derive(Serialize)]
pub struct ActionResponse {
    success: bool,
    booking: Booking,
    message: String,
}

// POST /api/bookings/:id/actions
pub async fn perform_action(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Result<Json<ActionRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let actor = authenticate(&headers, &state.config)?;
    let Json(body) = body?;
    let action = BookingAction::try_from(body)?;

    let outcome = bookings::perform_action(&state.db, &actor, &id, action)?;

    if outcome.recorded_events() {
        state.outbox_signal.notify_one();
    }

    let response = match outcome {
        ActionOutcome::Applied { booking, message } | ActionOutcome::Unchanged { booking, message } => {
            Json(ActionResponse {
                success: true,
                booking,
                message,
            })
            .into_response()
        }
        ActionOutcome::AutoDeclined {
            booking,
            required,
            available,
        } => {
            let err = AppError::InsufficientFunds {
                required,
                available,
            };
            (
                StatusCode::PAYMENT_REQUIRED,
                Json(serde_json::json!({
                    "error": format!("{err}; the booking was declined"),
                    "code": err.code(),
                    "required": required,
                    "available": available,
                    "autoDeclined": true,
                    "booking": booking,
                })),
            )
                .into_response()
        }
    };

    Ok(response)
}

// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    let actor = authenticate(&headers, &state.config)?;
    let booking = bookings::get_booking(&state.db, &actor, &id)?;
    Ok(Json(booking))
}

// DELETE /api/bookings/:id
pub async fn delete_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let actor = authenticate(&headers, &state.config)?;
    bookings::delete_booking(&state.db, &actor, &id)?;
    Ok(Json(serde_json::json!({ "success": true, "message": "Booking deleted" })))
}
