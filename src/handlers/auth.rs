use axum::http::HeaderMap;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::models::Actor;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// Resolves the caller forwarded by the identity gateway. The gateway proves
/// itself with the shared bearer token; the actor id is never taken from the
/// request body.
pub fn authenticate(headers: &HeaderMap, config: &AppConfig) -> Result<Actor, AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token.is_empty() || token != config.gateway_token {
        return Err(AppError::Unauthorized);
    }

    let actor_id = headers
        .get(ACTOR_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .unwrap_or("");
    if actor_id.is_empty() {
        return Err(AppError::Unauthorized);
    }

    let is_admin = headers
        .get(ACTOR_ROLE_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|role| role.eq_ignore_ascii_case("admin"));

    Ok(Actor {
        id: actor_id.to_string(),
        is_admin,
    })
}

pub fn require_admin(actor: &Actor) -> Result<(), AppError> {
    if !actor.is_admin {
        return Err(AppError::Forbidden("admin role required".to_string()));
    }
    Ok(())
}
