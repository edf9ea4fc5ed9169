use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Serialize;
use uuid::Uuid;

use crate::engine::booking::RoutingDecision;
use crate::engine::history::replay;
use crate::engine::matching::MatchOutcome;
use crate::error::AppError;
use crate::models::event::OfferEvent;
use crate::models::match_run::{MatchCandidate, MatchRun};
use crate::models::negotiation::{BrokerDecision, DriverResponse, Negotiation, ResponseOutcome};
use crate::models::offer::{Offer, OfferPayload, OfferStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/offers", post(create_offer))
        .route("/offers/:id", get(get_offer))
        .route("/offers/:id/events", get(list_events))
        .route("/offers/:id/negotiations", get(list_negotiations))
        .route("/offers/:id/match", post(run_match))
        .route("/offers/:id/match-runs", get(list_match_runs))
        .route("/offers/:id/route", post(route_offer))
        .route("/offers/:id/responses", post(driver_response))
        .route("/offers/:id/broker-decision", post(broker_decision))
        .route("/match-runs/:id", get(get_match_run))
}

#[derive(Serialize)]
struct OfferHistory {
    events: Vec<OfferEvent>,
    replayed_status: Option<OfferStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    replay_error: Option<String>,
}

#[derive(Serialize)]
struct MatchRunView {
    run: MatchRun,
    candidates: Vec<MatchCandidate>,
}

async fn create_offer(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<OfferPayload>,
) -> Result<Json<Offer>, AppError> {
    // Escalation leaves the offer FAILED; the caller sees that in the status.
    Ok(Json(state.engine.ingest_and_route(payload).await?))
}

async fn get_offer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Offer>, AppError> {
    Ok(Json(load_offer(&state, id)?))
}

async fn list_events(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<OfferHistory>, AppError> {
    load_offer(&state, id)?;
    let events = state.engine.stores().events.events_for(id)?;

    let (replayed_status, replay_error) = match replay(&events) {
        Ok(status) => (Some(status), None),
        Err(err) => (None, Some(err.to_string())),
    };

    Ok(Json(OfferHistory {
        events,
        replayed_status,
        replay_error,
    }))
}

async fn list_negotiations(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Negotiation>>, AppError> {
    load_offer(&state, id)?;
    Ok(Json(state.engine.stores().negotiations.negotiations_for(id)?))
}

async fn run_match(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchOutcome>, AppError> {
    Ok(Json(state.engine.run_match(id).await?))
}

async fn list_match_runs(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<MatchRun>>, AppError> {
    load_offer(&state, id)?;
    Ok(Json(state.engine.stores().match_runs.runs_for_offer(id)?))
}

async fn get_match_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchRunView>, AppError> {
    let (run, candidates) = state
        .engine
        .stores()
        .match_runs
        .fetch_run(id)?
        .ok_or_else(|| AppError::NotFound(format!("match run {id} not found")))?;

    Ok(Json(MatchRunView { run, candidates }))
}

async fn route_offer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<RoutingDecision>, AppError> {
    Ok(Json(state.engine.route_to_candidates(id).await?))
}

async fn driver_response(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DriverResponse>,
) -> Result<Json<ResponseOutcome>, AppError> {
    Ok(Json(state.engine.handle_driver_response(id, payload).await?))
}

async fn broker_decision(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<BrokerDecision>,
) -> Result<Json<Offer>, AppError> {
    Ok(Json(state.engine.handle_broker_decision(id, payload).await?))
}

fn load_offer(state: &AppState, id: Uuid) -> Result<Offer, AppError> {
    state
        .engine
        .stores()
        .offers
        .fetch_offer(id)?
        .ok_or_else(|| AppError::NotFound(format!("offer {id} not found")))
}
