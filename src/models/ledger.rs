use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    pub actor_id: String,
    pub amount: i64,
    pub action: LedgerAction,
    pub metadata: LedgerMetadata,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LedgerAction {
    BookingEscrow,
    BookingPayment,
    BookingRefund,
    CoinTopup,
}

impl LedgerAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerAction::BookingEscrow => "booking_escrow",
            LedgerAction::BookingPayment => "booking_payment",
            LedgerAction::BookingRefund => "booking_refund",
            LedgerAction::CoinTopup => "coin_topup",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "booking_escrow" => Some(LedgerAction::BookingEscrow),
            "booking_payment" => Some(LedgerAction::BookingPayment),
            "booking_refund" => Some(LedgerAction::BookingRefund),
            "coin_topup" => Some(LedgerAction::CoinTopup),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counterpart_id: Option<String>,
    /// Actor whose request caused the entry; differs from the parties on admin overrides.
    pub performed_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl LedgerMetadata {
    pub fn for_booking(booking_id: &str, counterpart_id: &str, performed_by: &str) -> Self {
        Self {
            booking_id: Some(booking_id.to_string()),
            counterpart_id: Some(counterpart_id.to_string()),
            performed_by: performed_by.to_string(),
            reference: None,
        }
    }
}
