use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::candidate::GeoPoint;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RateType {
    Flat,
    PerMile,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferStatus {
    NewOfferCaptured,
    Validating,
    RoutingToCandidates,
    OfferSent,
    WaitingResponse,
    Negotiating,
    Booked,
    Failed,
}

impl OfferStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NewOfferCaptured => "NEW_OFFER_CAPTURED",
            Self::Validating => "VALIDATING",
            Self::RoutingToCandidates => "ROUTING_TO_CANDIDATES",
            Self::OfferSent => "OFFER_SENT",
            Self::WaitingResponse => "WAITING_RESPONSE",
            Self::Negotiating => "NEGOTIATING",
            Self::Booked => "BOOKED",
            Self::Failed => "FAILED",
        }
    }

    /// States in which the assigned candidate owes us an answer.
    pub const fn awaits_candidate(self) -> bool {
        matches!(self, Self::OfferSent | Self::WaitingResponse)
    }

    pub fn can_transition_to(self, next: OfferStatus) -> bool {
        use OfferStatus::*;

        match self {
            NewOfferCaptured => matches!(next, Validating | RoutingToCandidates | Failed),
            Validating => matches!(next, RoutingToCandidates | Failed),
            RoutingToCandidates => matches!(next, OfferSent | Failed),
            OfferSent => matches!(
                next,
                WaitingResponse | Negotiating | RoutingToCandidates | Booked | Failed
            ),
            WaitingResponse => matches!(
                next,
                Negotiating | RoutingToCandidates | Booked | Failed
            ),
            Negotiating => matches!(
                next,
                WaitingResponse | RoutingToCandidates | Booked | Failed
            ),
            Booked | Failed => false,
        }
    }
}

impl fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    pub id: Uuid,
    pub broker_id: String,
    pub pickup: GeoPoint,
    pub dropoff: GeoPoint,
    pub rate: f64,
    pub rate_type: RateType,
    pub required_tags: BTreeSet<String>,
    pub status: OfferStatus,
    pub source_call_id: Option<String>,
    pub assigned_candidate: Option<String>,
    pub declined_by: BTreeSet<String>,
    pub awaiting_since: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Inbound payload produced by the upstream intake (voice agent, broker form).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferPayload {
    pub broker_id: String,
    pub pickup: GeoPoint,
    pub dropoff: GeoPoint,
    pub rate: f64,
    pub rate_type: RateType,
    #[serde(default)]
    pub required_tags: BTreeSet<String>,
    #[serde(default)]
    pub source_call_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::OfferStatus::{self, *};

    const ALL: [OfferStatus; 8] = [
        NewOfferCaptured,
        Validating,
        RoutingToCandidates,
        OfferSent,
        WaitingResponse,
        Negotiating,
        Booked,
        Failed,
    ];

    #[test]
    fn terminal_states_have_no_exits() {
        for next in ALL {
            assert!(!Booked.can_transition_to(next));
            assert!(!Failed.can_transition_to(next));
        }
    }

    #[test]
    fn responses_move_waiting_offers_forward() {
        for from in [OfferSent, WaitingResponse] {
            assert!(from.can_transition_to(Booked));
            assert!(from.can_transition_to(Negotiating));
            assert!(from.can_transition_to(RoutingToCandidates));
        }
    }

    #[test]
    fn negotiation_loops_back_to_waiting() {
        assert!(Negotiating.can_transition_to(WaitingResponse));
        assert!(WaitingResponse.can_transition_to(Negotiating));
        assert!(!RoutingToCandidates.can_transition_to(Booked));
    }

    #[test]
    fn status_serializes_in_screaming_case() {
        let json = serde_json::to_string(&RoutingToCandidates).unwrap();
        assert_eq!(json, "\"ROUTING_TO_CANDIDATES\"");
        assert_eq!(RoutingToCandidates.to_string(), "ROUTING_TO_CANDIDATES");
    }
}
