//! Capabilities behind the reliability, broker-fit and price-fit factors.
//!
//! Each provider returns a value on a 0–100 scale. The scoring engine clamps
//! whatever comes back, so implementations backed by historical lookups can
//! report raw ratios without re-normalizing.

use crate::models::candidate::Candidate;
use crate::models::offer::Offer;

pub trait TrustScoreProvider: Send + Sync {
    fn reliability(&self, candidate: &Candidate) -> f64;
}

pub trait BrokerAffinityProvider: Send + Sync {
    fn broker_fit(&self, broker_id: &str, candidate: &Candidate) -> f64;
}

pub trait RateFitEstimator: Send + Sync {
    fn price_fit(&self, offer: &Offer, candidate: &Candidate) -> f64;
}

/// Reads reliability straight off the candidate's trust score.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileTrustScore;

impl TrustScoreProvider for ProfileTrustScore {
    fn reliability(&self, candidate: &Candidate) -> f64 {
        candidate.trust_score
    }
}

/// Constant factor value, used until a historical lookup is wired in.
#[derive(Debug, Clone, Copy)]
pub struct FixedScore(pub f64);

impl TrustScoreProvider for FixedScore {
    fn reliability(&self, _candidate: &Candidate) -> f64 {
        self.0
    }
}

impl BrokerAffinityProvider for FixedScore {
    fn broker_fit(&self, _broker_id: &str, _candidate: &Candidate) -> f64 {
        self.0
    }
}

impl RateFitEstimator for FixedScore {
    fn price_fit(&self, _offer: &Offer, _candidate: &Candidate) -> f64 {
        self.0
    }
}
