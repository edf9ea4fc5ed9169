//! Out-of-band messages to candidates, brokers and operations staff.
//!
//! Delivery (SMS, push, voice callback) is owned elsewhere; from the booking
//! pipeline's point of view a dispatch is fire-and-forget.

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::models::candidate::GeoPoint;
use crate::models::offer::RateType;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    OfferToCandidate {
        offer_id: Uuid,
        candidate_id: String,
        rate: f64,
        rate_type: RateType,
        pickup: GeoPoint,
        dropoff: GeoPoint,
    },
    RateUpdateToCandidate {
        offer_id: Uuid,
        candidate_id: String,
        rate: f64,
    },
    CounterToBroker {
        offer_id: Uuid,
        broker_id: String,
        candidate_id: String,
        counter_rate: f64,
    },
    BookingConfirmed {
        offer_id: Uuid,
        broker_id: String,
        candidate_id: String,
        rate: f64,
    },
    Escalation {
        offer_id: Uuid,
        broker_id: String,
        reason: String,
    },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::OfferToCandidate { .. } => "offer_to_candidate",
            Notification::RateUpdateToCandidate { .. } => "rate_update_to_candidate",
            Notification::CounterToBroker { .. } => "counter_to_broker",
            Notification::BookingConfirmed { .. } => "booking_confirmed",
            Notification::Escalation { .. } => "escalation",
        }
    }
}

pub trait Notifier: Send + Sync {
    fn dispatch(&self, notification: Notification);
}

/// Emits notifications as structured log lines; the default when no delivery
/// adapter is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn dispatch(&self, notification: Notification) {
        let body = serde_json::to_string(&notification).unwrap_or_else(|_| "{}".to_string());
        info!(kind = notification.kind(), notification = %body, "notification dispatched");
    }
}
