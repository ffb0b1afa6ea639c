use crate::errors::AppError;
use crate::models::{Actor, Booking, BookingAction, Role, RoleSet};

pub fn resolve_roles(actor: &Actor, booking: &Booking) -> RoleSet {
    RoleSet {
        client: actor.id == booking.client_id,
        provider: actor.id == booking.provider_id,
        admin: actor.is_admin,
    }
}

/// Party roles allowed to trigger `action`. Admins may trigger every action.
pub fn allowed_roles(action: &BookingAction) -> &'static [Role] {
    match action {
        BookingAction::Accept { .. }
        | BookingAction::Decline { .. }
        | BookingAction::Counter { .. }
        | BookingAction::Complete
        | BookingAction::NoShow => &[Role::Provider],
        BookingAction::AcceptCounter => &[Role::Client],
        BookingAction::Confirm | BookingAction::Cancel { .. } => &[Role::Client, Role::Provider],
    }
}

pub fn authorize(actor: &Actor, booking: &Booking, action: &BookingAction) -> Result<RoleSet, AppError> {
    let roles = resolve_roles(actor, booking);
    if roles.admin || allowed_roles(action).iter().any(|role| roles.contains(*role)) {
        return Ok(roles);
    }

    tracing::warn!(
        actor_id = %actor.id,
        booking_id = %booking.id,
        action = action.name(),
        "actor not permitted to perform action"
    );
    Err(AppError::Forbidden(format!(
        "not permitted to {} this booking",
        action.name()
    )))
}

/// Only the client who requested the booking (or an admin) may delete it.
pub fn authorize_delete(actor: &Actor, booking: &Booking) -> Result<RoleSet, AppError> {
    let roles = resolve_roles(actor, booking);
    if roles.admin || roles.client {
        return Ok(roles);
    }
    Err(AppError::Forbidden(
        "only the requesting client may delete this booking".to_string(),
    ))
}

pub fn authorize_view(actor: &Actor, booking: &Booking) -> Result<RoleSet, AppError> {
    let roles = resolve_roles(actor, booking);
    if roles.is_empty() {
        return Err(AppError::Forbidden("not a party to this booking".to_string()));
    }
    Ok(roles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BookingStatus, ServiceType};

    fn booking() -> Booking {
        let now = chrono::Utc::now().naive_utc();
        Booking {
            id: "bk-1".to_string(),
            booking_number: "BK-0001".to_string(),
            client_id: "client-1".to_string(),
            provider_id: "provider-1".to_string(),
            service_type: ServiceType::Hosting,
            event_date: now,
            total_amount: 500,
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
        }
    }

    #[test]
    fn test_provider_actions_reject_client() {
        let client = Actor::user("client-1");
        for action in [
            BookingAction::Accept { notes: None },
            BookingAction::Decline { notes: None },
            BookingAction::Counter {
                amount: 10,
                notes: None,
            },
            BookingAction::Complete,
            BookingAction::NoShow,
        ] {
            assert!(
                matches!(authorize(&client, &booking(), &action), Err(AppError::Forbidden(_))),
                "{} should be provider-only",
                action.name()
            );
        }
    }

    #[test]
    fn test_accept_counter_is_client_only() {
        let b = booking();
        assert!(authorize(&Actor::user("client-1"), &b, &BookingAction::AcceptCounter).is_ok());
        assert!(authorize(&Actor::user("provider-1"), &b, &BookingAction::AcceptCounter).is_err());
    }

    #[test]
    fn test_either_party_may_confirm_or_cancel() {
        let b = booking();
        for id in ["client-1", "provider-1"] {
            assert!(authorize(&Actor::user(id), &b, &BookingAction::Confirm).is_ok());
            assert!(authorize(&Actor::user(id), &b, &BookingAction::Cancel { reason: None }).is_ok());
        }
    }

    #[test]
    fn test_stranger_is_forbidden() {
        let stranger = Actor::user("someone-else");
        assert!(authorize(&stranger, &booking(), &BookingAction::Confirm).is_err());
        assert!(authorize_view(&stranger, &booking()).is_err());
        assert!(authorize_delete(&stranger, &booking()).is_err());
    }

    #[test]
    fn test_admin_may_do_everything() {
        let admin = Actor::admin("support-7");
        let roles = authorize(&admin, &booking(), &BookingAction::AcceptCounter).unwrap();
        assert!(roles.admin);
        assert!(!roles.is_party());
        assert!(authorize_delete(&admin, &booking()).is_ok());
    }

    #[test]
    fn test_provider_cannot_delete() {
        assert!(authorize_delete(&Actor::user("provider-1"), &booking()).is_err());
        assert!(authorize_delete(&Actor::user("client-1"), &booking()).is_ok());
    }
}
