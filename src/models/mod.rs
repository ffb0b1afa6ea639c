pub mod action;
pub mod actor;
pub mod booking;
pub mod event;
pub mod ledger;

pub use action::{ActionRequest, BookingAction};
pub use actor::{Actor, Role, RoleSet};
pub use booking::{Booking, BookingStatus, ServiceType};
pub use event::{
    EmailRequest, EmailTemplate, EmailTrigger, NotificationEvent, OutboxMessage,
};
pub use ledger::{LedgerAction, LedgerEntry, LedgerMetadata};
