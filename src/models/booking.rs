use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub booking_number: String,
    pub client_id: String,
    pub provider_id: String,
    pub service_type: ServiceType,
    pub event_date: NaiveDateTime,
    pub total_amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counter_amount: Option<i64>,
    pub client_notes: Option<String>,
    pub response_notes: Option<String>,
    pub counter_notes: Option<String>,
    pub status: BookingStatus,
    pub responded_at: Option<NaiveDateTime>,
    pub confirmed_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
    pub cancelled_at: Option<NaiveDateTime>,
    pub cancelled_by: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Booking {
    /// The outstanding counter-offer. Only visible while the booking is in `counter`.
    pub fn counter_offer(&self) -> Option<i64> {
        match self.status {
            BookingStatus::Counter => self.counter_amount,
            _ => None,
        }
    }

    /// Strips fields that must not be observable outside their owning status.
    pub fn redacted(mut self) -> Self {
        self.counter_amount = self.counter_offer();
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Accepted,
    Declined,
    Counter,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 8] = [
        BookingStatus::Pending,
        BookingStatus::Accepted,
        BookingStatus::Declined,
        BookingStatus::Counter,
        BookingStatus::Confirmed,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
        BookingStatus::NoShow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Accepted => "accepted",
            BookingStatus::Declined => "declined",
            BookingStatus::Counter => "counter",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::NoShow => "no_show",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }

    /// Statuses in which the client's coins are held against the booking.
    pub fn holds_escrow(&self) -> bool {
        matches!(self, BookingStatus::Accepted | BookingStatus::Confirmed)
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    Performance,
    Appearance,
    Hosting,
    Modeling,
    VideoCall,
    Other,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Performance => "performance",
            ServiceType::Appearance => "appearance",
            ServiceType::Hosting => "hosting",
            ServiceType::Modeling => "modeling",
            ServiceType::VideoCall => "video_call",
            ServiceType::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "performance" => ServiceType::Performance,
            "appearance" => ServiceType::Appearance,
            "hosting" => ServiceType::Hosting,
            "modeling" => ServiceType::Modeling,
            "video_call" => ServiceType::VideoCall,
            _ => ServiceType::Other,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ServiceType::Performance => "Performance",
            ServiceType::Appearance => "Appearance",
            ServiceType::Hosting => "Hosting",
            ServiceType::Modeling => "Modeling",
            ServiceType::VideoCall => "Video call",
            ServiceType::Other => "Other",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_storage_names() {
        for status in BookingStatus::ALL {
            assert_eq!(BookingStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(BookingStatus::parse("archived"), None);
    }

    #[test]
    fn test_counter_offer_hidden_outside_counter() {
        let now = chrono::Utc::now().naive_utc();
        let mut booking = Booking {
            id: "b1".to_string(),
            booking_number: "BK-0001".to_string(),
            client_id: "client".to_string(),
            provider_id: "provider".to_string(),
            service_type: ServiceType::Performance,
            event_date: now,
            total_amount: 500,
            counter_amount: Some(700),
            client_notes: None,
            response_notes: None,
            counter_notes: None,
            status: BookingStatus::Counter,
            responded_at: None,
            confirmed_at: None,
            completed_at: None,
            cancelled_at: None,
            cancelled_by: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(booking.counter_offer(), Some(700));

        booking.status = BookingStatus::Declined;
        assert_eq!(booking.counter_offer(), None);
        assert_eq!(booking.redacted().counter_amount, None);
    }
}
