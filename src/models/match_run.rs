use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const ALGORITHM_VERSION: &str = "v1.0";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunReason {
    NewOffer,
    ReRoute,
    Manual,
}

impl RunReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NewOffer => "NEW_OFFER",
            Self::ReRoute => "RE_ROUTE",
            Self::Manual => "MANUAL",
        }
    }
}

/// Per-factor values, each on a 0–100 scale before weighting.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ScoreBreakdown {
    pub proximity: f64,
    pub readiness: f64,
    pub reliability: f64,
    pub broker_fit: f64,
    pub price_fit: f64,
    pub specialization: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRun {
    pub id: Uuid,
    pub offer_id: Uuid,
    pub reason: RunReason,
    pub algorithm_version: String,
    pub pool_size: usize,
    pub excluded: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub match_run_id: Uuid,
    pub candidate_id: String,
    pub rank: u32,
    pub total_score: u8,
    pub breakdown: ScoreBreakdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub candidate_id: String,
    pub rank: u32,
    pub total_score: u8,
    pub breakdown: ScoreBreakdown,
}
