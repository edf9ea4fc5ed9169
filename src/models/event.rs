use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::models::offer::OfferStatus;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferEventType {
    StateChange,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransitionPayload {
    pub from_state: OfferStatus,
    pub to_state: OfferStatus,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferEvent {
    pub id: Uuid,
    pub offer_id: Uuid,
    pub sequence: u64,
    pub event_type: OfferEventType,
    pub payload: TransitionPayload,
    pub recorded_at: DateTime<Utc>,
}
