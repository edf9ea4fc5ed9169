//! Fixtures shared by the engine unit tests.

use std::collections::BTreeSet;
use std::sync::Mutex;

use chrono::Utc;
use uuid::Uuid;

use crate::models::candidate::{Availability, Candidate, GeoPoint};
use crate::models::offer::{Offer, OfferPayload, OfferStatus, RateType};
use crate::notify::{Notification, Notifier};
use crate::store::MemoryStore;

const MILES_PER_DEGREE_LAT: f64 = 3_958.8 * std::f64::consts::PI / 180.0;

pub fn candidate(id: &str) -> Candidate {
    Candidate {
        id: id.to_string(),
        location: GeoPoint {
            lat: 35.4676,
            lng: -97.5164,
        },
        service_radius_miles: 250.0,
        equipment_tags: BTreeSet::new(),
        status: Availability::AvailableNow,
        trust_score: 75.0,
        response_avg_secs: 300.0,
        cancel_rate: 0.02,
        updated_at: Utc::now(),
    }
}

/// Candidate due north of the offer pickup at the given distance.
pub fn candidate_near(offer: &Offer, id: &str, miles: f64) -> Candidate {
    let mut c = candidate(id);
    c.location = GeoPoint {
        lat: offer.pickup.lat + miles / MILES_PER_DEGREE_LAT,
        lng: offer.pickup.lng,
    };
    c
}

pub fn offer_requiring(tags: &[&str]) -> Offer {
    let now = Utc::now();
    Offer {
        id: Uuid::new_v4(),
        broker_id: "broker-1".to_string(),
        pickup: GeoPoint {
            lat: 35.4676,
            lng: -97.5164,
        },
        dropoff: GeoPoint {
            lat: 32.7767,
            lng: -96.7970,
        },
        rate: 450.0,
        rate_type: RateType::Flat,
        required_tags: tags.iter().map(|tag| tag.to_string()).collect(),
        status: OfferStatus::RoutingToCandidates,
        source_call_id: None,
        assigned_candidate: None,
        declined_by: BTreeSet::new(),
        awaiting_since: None,
        created_at: now,
        updated_at: now,
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn dispatch(&self, notification: Notification) {
        self.sent.lock().unwrap().push(notification);
    }
}

pub fn payload(tags: &[&str]) -> OfferPayload {
    let offer = offer_requiring(tags);
    OfferPayload {
        broker_id: offer.broker_id,
        pickup: offer.pickup,
        dropoff: offer.dropoff,
        rate: offer.rate,
        rate_type: offer.rate_type,
        required_tags: offer.required_tags,
        source_call_id: Some("call-001".to_string()),
    }
}

/// Adds available candidates at the given distances from the fixture pickup.
pub fn seed(store: &MemoryStore, candidates: &[(&str, f64)]) {
    let reference = offer_requiring(&[]);
    for (id, miles) in candidates {
        store.upsert_candidate(candidate_near(&reference, id, *miles));
    }
}
