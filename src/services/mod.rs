pub mod bookings;
pub mod delivery;
pub mod events;
pub mod guard;
pub mod ledger;
pub mod machine;
pub mod outbox;
