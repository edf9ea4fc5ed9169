use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Availability {
    Offline,
    AvailableNow,
    Busy,
}

/// Escort operator profile as exposed by the candidate store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub location: GeoPoint,
    pub service_radius_miles: f64,
    pub equipment_tags: BTreeSet<String>,
    pub status: Availability,
    pub trust_score: f64,
    pub response_avg_secs: f64,
    pub cancel_rate: f64,
    pub updated_at: DateTime<Utc>,
}

impl Candidate {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.equipment_tags.contains(tag)
    }
}
