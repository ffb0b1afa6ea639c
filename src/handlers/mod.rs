pub mod auth;
pub mod balances;
pub mod bookings;
pub mod health;
