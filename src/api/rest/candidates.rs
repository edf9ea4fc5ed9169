use std::collections::BTreeSet;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{patch, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;

use crate::error::AppError;
use crate::models::candidate::{Availability, Candidate, GeoPoint};
use crate::state::AppState;
use crate::store::{CandidateStore, StoreError};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/candidates", post(upsert_candidate).get(list_candidates))
        .route("/candidates/:id/status", patch(update_candidate_status))
}

#[derive(Deserialize)]
pub struct UpsertCandidateRequest {
    pub id: String,
    pub location: GeoPoint,
    pub service_radius_miles: f64,
    #[serde(default)]
    pub equipment_tags: BTreeSet<String>,
    pub status: Availability,
    pub trust_score: f64,
    #[serde(default)]
    pub response_avg_secs: f64,
    #[serde(default)]
    pub cancel_rate: f64,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: Availability,
}

async fn upsert_candidate(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<UpsertCandidateRequest>,
) -> Result<Json<Candidate>, AppError> {
    if payload.id.trim().is_empty() {
        return Err(AppError::Validation("id cannot be empty".to_string()));
    }
    if !payload.location.is_valid() {
        return Err(AppError::Validation("location must be valid coordinates".to_string()));
    }
    if !payload.service_radius_miles.is_finite() || payload.service_radius_miles < 0.0 {
        return Err(AppError::Validation(
            "service_radius_miles must be >= 0".to_string(),
        ));
    }

    let candidate = Candidate {
        id: payload.id.trim().to_string(),
        location: payload.location,
        service_radius_miles: payload.service_radius_miles,
        equipment_tags: payload.equipment_tags,
        status: payload.status,
        trust_score: payload.trust_score.clamp(0.0, 100.0),
        response_avg_secs: payload.response_avg_secs.max(0.0),
        cancel_rate: payload.cancel_rate.clamp(0.0, 1.0),
        updated_at: Utc::now(),
    };

    state.store.upsert_candidate(candidate.clone());
    Ok(Json(candidate))
}

async fn list_candidates(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Candidate>>, AppError> {
    let candidates = state.store.candidate_pool(usize::MAX, &BTreeSet::new())?;
    Ok(Json(candidates))
}

async fn update_candidate_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Candidate>, AppError> {
    let candidate = state
        .store
        .set_candidate_status(&id, payload.status)
        .map_err(|err| match err {
            StoreError::NotFound(_) => AppError::NotFound(format!("candidate {id} not found")),
            other => other.into(),
        })?;

    Ok(Json(candidate))
}
