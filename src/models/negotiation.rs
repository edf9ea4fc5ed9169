use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NegotiationStatus {
    Pending,
    Countered,
    Accepted,
    Declined,
}

impl NegotiationStatus {
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Countered)
    }
}

/// One row of a candidate's response cycle. Rows are appended, never edited;
/// the latest row for an offer decides whether a negotiation is still active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Negotiation {
    pub id: Uuid,
    pub offer_id: Uuid,
    pub candidate_id: String,
    pub status: NegotiationStatus,
    pub counter_rate: Option<f64>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Negotiation {
    pub fn new(offer_id: Uuid, candidate_id: impl Into<String>, status: NegotiationStatus) -> Self {
        Self {
            id: Uuid::new_v4(),
            offer_id,
            candidate_id: candidate_id.into(),
            status,
            counter_rate: None,
            note: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_counter_rate(mut self, rate: f64) -> Self {
        self.counter_rate = Some(rate);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriverAction {
    Accept,
    Decline,
    Counter,
}

impl DriverAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accept => "ACCEPT",
            Self::Decline => "DECLINE",
            Self::Counter => "COUNTER",
        }
    }
}

/// A driver reply delivered by the SMS/push/voice webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverResponse {
    pub driver_id: String,
    pub action: DriverAction,
    #[serde(default)]
    pub counter_rate: Option<f64>,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "decision", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BrokerDecision {
    AcceptCounter,
    RejectCounter,
    Revise { rate: f64 },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ResponseOutcome {
    Applied { status: crate::models::offer::OfferStatus },
    Duplicate,
}
