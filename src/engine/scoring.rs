use std::sync::Arc;

use serde::Serialize;

use crate::engine::gate::{self, HardBlock};
use crate::engine::providers::{
    BrokerAffinityProvider, FixedScore, ProfileTrustScore, RateFitEstimator, TrustScoreProvider,
};
use crate::geo::haversine_miles;
use crate::models::candidate::{Availability, Candidate};
use crate::models::match_run::ScoreBreakdown;
use crate::models::offer::Offer;

// Weights are whole percentages so integer factor values sum exactly.
const PROXIMITY_WEIGHT: f64 = 30.0;
const READINESS_WEIGHT: f64 = 20.0;
const RELIABILITY_WEIGHT: f64 = 15.0;
const BROKER_FIT_WEIGHT: f64 = 15.0;
const PRICE_FIT_WEIGHT: f64 = 10.0;
const SPECIALIZATION_WEIGHT: f64 = 10.0;

const LOCAL_RADIUS_MILES: f64 = 10.0;
const SPECIALTY_TAGS: [&str; 2] = ["high_pole", "superload_ready"];
const SPECIALTY_BONUS: f64 = 40.0;

#[derive(Debug, Clone, Serialize)]
pub struct ScoredCandidate {
    pub candidate_id: String,
    pub total_score: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hard_block_reason: Option<HardBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<ScoreBreakdown>,
}

impl ScoredCandidate {
    pub fn is_blocked(&self) -> bool {
        self.hard_block_reason.is_some()
    }
}

/// Six-factor scorer. Holds no mutable state: the same candidate and offer
/// always produce the same total and breakdown.
#[derive(Clone)]
pub struct ScoringEngine {
    trust: Arc<dyn TrustScoreProvider>,
    affinity: Arc<dyn BrokerAffinityProvider>,
    rate_fit: Arc<dyn RateFitEstimator>,
}

impl ScoringEngine {
    pub fn new(
        trust: Arc<dyn TrustScoreProvider>,
        affinity: Arc<dyn BrokerAffinityProvider>,
        rate_fit: Arc<dyn RateFitEstimator>,
    ) -> Self {
        Self {
            trust,
            affinity,
            rate_fit,
        }
    }

    pub fn with_defaults(broker_fit: f64, price_fit: f64) -> Self {
        Self::new(
            Arc::new(ProfileTrustScore),
            Arc::new(FixedScore(broker_fit)),
            Arc::new(FixedScore(price_fit)),
        )
    }

    pub fn score(&self, candidate: &Candidate, offer: &Offer) -> ScoredCandidate {
        if let Some(block) = gate::check(candidate, offer) {
            return ScoredCandidate {
                candidate_id: candidate.id.clone(),
                total_score: 0,
                hard_block_reason: Some(block),
                breakdown: None,
            };
        }

        let breakdown = self.breakdown(candidate, offer);

        ScoredCandidate {
            candidate_id: candidate.id.clone(),
            total_score: weighted_total(&breakdown),
            hard_block_reason: None,
            breakdown: Some(breakdown),
        }
    }

    pub fn breakdown(&self, candidate: &Candidate, offer: &Offer) -> ScoreBreakdown {
        let distance = haversine_miles(&candidate.location, &offer.pickup);

        ScoreBreakdown {
            proximity: proximity_score(distance, candidate.service_radius_miles),
            readiness: readiness_score(candidate.status),
            reliability: normalize(self.trust.reliability(candidate)),
            broker_fit: normalize(self.affinity.broker_fit(&offer.broker_id, candidate)),
            price_fit: normalize(self.rate_fit.price_fit(offer, candidate)),
            specialization: specialization_score(candidate),
        }
    }
}

/// Recomputes the rounded total from a breakdown, e.g. one read back from a
/// stored match candidate.
pub fn weighted_total(breakdown: &ScoreBreakdown) -> u8 {
    let weighted = (breakdown.proximity * PROXIMITY_WEIGHT)
        + (breakdown.readiness * READINESS_WEIGHT)
        + (breakdown.reliability * RELIABILITY_WEIGHT)
        + (breakdown.broker_fit * BROKER_FIT_WEIGHT)
        + (breakdown.price_fit * PRICE_FIT_WEIGHT)
        + (breakdown.specialization * SPECIALIZATION_WEIGHT);

    (weighted / 100.0).round().clamp(0.0, 100.0) as u8
}

pub fn proximity_score(distance_miles: f64, service_radius_miles: f64) -> f64 {
    if distance_miles <= LOCAL_RADIUS_MILES {
        return 100.0;
    }
    if service_radius_miles <= 0.0 {
        return 0.0;
    }

    100.0 * (1.0 - distance_miles / service_radius_miles).max(0.0)
}

fn readiness_score(status: Availability) -> f64 {
    match status {
        Availability::AvailableNow => 100.0,
        _ => 50.0,
    }
}

fn specialization_score(candidate: &Candidate) -> f64 {
    let bonus: f64 = SPECIALTY_TAGS
        .iter()
        .filter(|tag| candidate.has_tag(tag))
        .map(|_| SPECIALTY_BONUS)
        .sum();

    bonus.min(100.0)
}

fn normalize(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::{proximity_score, weighted_total, ScoringEngine};
    use crate::engine::testing::{candidate, candidate_near, offer_requiring};
    use crate::models::candidate::Availability;
    use crate::models::match_run::ScoreBreakdown;

    fn engine() -> ScoringEngine {
        ScoringEngine::with_defaults(80.0, 100.0)
    }

    #[test]
    fn nearby_available_candidate_scores_86() {
        let offer = offer_requiring(&[]);
        let mut c = candidate_near(&offer, "op-1", 5.0);
        c.service_radius_miles = 500.0;
        c.trust_score = 90.0;

        let scored = engine().score(&c, &offer);
        let breakdown = scored.breakdown.unwrap();

        assert_eq!(breakdown.proximity, 100.0);
        assert_eq!(breakdown.readiness, 100.0);
        assert_eq!(breakdown.specialization, 0.0);
        assert_eq!(scored.total_score, 86);
    }

    #[test]
    fn missing_required_tag_blocks_even_a_perfect_candidate() {
        let offer = offer_requiring(&["high_pole"]);
        let mut c = candidate_near(&offer, "op-1", 1.0);
        c.trust_score = 100.0;
        c.equipment_tags.insert("superload_ready".to_string());

        let scored = engine().score(&c, &offer);

        assert_eq!(scored.total_score, 0);
        assert_eq!(
            scored.hard_block_reason.map(|b| b.to_string()).as_deref(),
            Some("MISSING_high_pole")
        );
        assert!(scored.breakdown.is_none());
    }

    #[test]
    fn offline_candidate_scores_zero() {
        let offer = offer_requiring(&[]);
        let mut c = candidate_near(&offer, "op-1", 1.0);
        c.status = Availability::Offline;

        let scored = engine().score(&c, &offer);
        assert_eq!(scored.total_score, 0);
        assert!(scored.is_blocked());
    }

    #[test]
    fn repeated_scoring_is_identical() {
        let offer = offer_requiring(&["chase"]);
        let mut c = candidate_near(&offer, "op-1", 140.0);
        c.equipment_tags.insert("chase".to_string());
        c.equipment_tags.insert("high_pole".to_string());
        c.status = Availability::Busy;

        let engine = engine();
        let first = engine.score(&c, &offer);
        let second = engine.score(&c, &offer);

        assert_eq!(first.total_score, second.total_score);
        assert_eq!(first.breakdown, second.breakdown);
    }

    #[test]
    fn total_matches_weighted_formula() {
        let offer = offer_requiring(&[]);
        let mut c = candidate_near(&offer, "op-1", 120.0);
        c.service_radius_miles = 300.0;
        c.status = Availability::Busy;
        c.trust_score = 64.0;
        c.equipment_tags.insert("high_pole".to_string());

        let scored = engine().score(&c, &offer);
        let b = scored.breakdown.unwrap();
        let expected = (0.30 * b.proximity
            + 0.20 * b.readiness
            + 0.15 * b.reliability
            + 0.15 * b.broker_fit
            + 0.10 * b.price_fit
            + 0.10 * b.specialization)
            .round() as u8;

        assert_eq!(scored.total_score, expected);
        assert_eq!(b.specialization, 40.0);
    }

    #[test]
    fn specialization_caps_at_80_for_both_tags() {
        let offer = offer_requiring(&[]);
        let mut c = candidate("op-1");
        c.equipment_tags.insert("high_pole".to_string());
        c.equipment_tags.insert("superload_ready".to_string());

        let b = engine().breakdown(&c, &offer);
        assert_eq!(b.specialization, 80.0);
    }

    #[test]
    fn proximity_decays_with_distance_and_floors_at_zero() {
        assert_eq!(proximity_score(10.0, 100.0), 100.0);
        assert!((proximity_score(50.0, 100.0) - 50.0).abs() < 1e-9);
        assert_eq!(proximity_score(250.0, 100.0), 0.0);
        assert_eq!(proximity_score(25.0, 0.0), 0.0);
    }

    #[test]
    fn stored_breakdown_reproduces_total() {
        let breakdown = ScoreBreakdown {
            proximity: 100.0,
            readiness: 50.0,
            reliability: 72.0,
            broker_fit: 80.0,
            price_fit: 100.0,
            specialization: 40.0,
        };

        // 30 + 10 + 10.8 + 12 + 10 + 4 = 76.8
        assert_eq!(weighted_total(&breakdown), 77);
    }
}
