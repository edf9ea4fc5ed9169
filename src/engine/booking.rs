use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::engine::locks::OfferLocks;
use crate::engine::matching::{MatchOrchestrator, MatchOutcome};
use crate::error::AppError;
use crate::models::event::{OfferEvent, TransitionPayload};
use crate::models::match_run::RunReason;
use crate::models::negotiation::{
    BrokerDecision, DriverAction, DriverResponse, Negotiation, NegotiationStatus, ResponseOutcome,
};
use crate::models::offer::{Offer, OfferPayload, OfferStatus};
use crate::notify::{Notification, Notifier};
use crate::observability::metrics::Metrics;
use crate::store::Stores;

const NO_ELIGIBLE_CANDIDATES: &str = "NO_ELIGIBLE_CANDIDATES";
const DEADLINE_ELAPSED: &str = "response deadline elapsed";
const ROUTING_ABORTED: &str = "routing aborted";

#[derive(Debug, Clone, Serialize)]
pub struct RoutingDecision {
    pub offer_id: Uuid,
    pub candidate_id: String,
    pub match_run_id: Uuid,
    pub total_score: u8,
}

/// Drives offers from capture to booking: routes each offer to one candidate at
/// a time, applies driver and broker responses, and re-routes on decline.
pub struct BookingEngine {
    stores: Stores,
    matcher: MatchOrchestrator,
    notifier: Arc<dyn Notifier>,
    locks: OfferLocks,
    metrics: Metrics,
    events_tx: broadcast::Sender<OfferEvent>,
    response_timeout: chrono::Duration,
}

impl BookingEngine {
    pub fn new(
        stores: Stores,
        matcher: MatchOrchestrator,
        notifier: Arc<dyn Notifier>,
        metrics: Metrics,
        response_timeout: chrono::Duration,
        event_buffer_size: usize,
    ) -> Self {
        let (events_tx, _unused_rx) = broadcast::channel(event_buffer_size.max(1));

        Self {
            stores,
            matcher,
            notifier,
            locks: OfferLocks::new(),
            metrics,
            events_tx,
            response_timeout,
        }
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OfferEvent> {
        self.events_tx.subscribe()
    }

    /// Validates the payload and creates the offer. Nothing is persisted when
    /// validation fails.
    pub async fn ingest_offer(&self, payload: OfferPayload) -> Result<Offer, AppError> {
        validate_payload(&payload)?;
        let offer = new_offer(payload);

        let _guard = self.locks.acquire(offer.id).await;
        self.capture(offer)
    }

    /// Captures the offer and runs its first routing under a single lock. An
    /// offer nobody can take comes back FAILED instead of as an error.
    pub async fn ingest_and_route(&self, payload: OfferPayload) -> Result<Offer, AppError> {
        validate_payload(&payload)?;
        let offer = new_offer(payload);

        let _guard = self.locks.acquire(offer.id).await;
        let offer = self.capture(offer)?;
        let offer_id = offer.id;

        match self.route(offer) {
            Ok(_) => {}
            Err(AppError::NoEligibleCandidates(id)) => {
                warn!(offer_id = %id, "offer captured but escalated on first routing");
            }
            Err(err) => return Err(err),
        }

        self.load_offer(offer_id)
    }

    fn capture(&self, mut offer: Offer) -> Result<Offer, AppError> {
        self.stores.offers.insert_offer(offer.clone())?;
        info!(
            offer_id = %offer.id,
            broker_id = %offer.broker_id,
            rate = offer.rate,
            "offer captured"
        );

        self.transition(&mut offer, OfferStatus::RoutingToCandidates, Map::new())?;

        Ok(offer)
    }

    /// Manual match run; records the run but does not route.
    pub async fn run_match(&self, offer_id: Uuid) -> Result<MatchOutcome, AppError> {
        let _guard = self.locks.acquire(offer_id).await;
        self.matcher.run_match(offer_id, RunReason::Manual)
    }

    pub async fn route_to_candidates(&self, offer_id: Uuid) -> Result<RoutingDecision, AppError> {
        let _guard = self.locks.acquire(offer_id).await;
        let offer = self.load_offer(offer_id)?;
        self.route(offer)
    }

    pub async fn handle_driver_response(
        &self,
        offer_id: Uuid,
        response: DriverResponse,
    ) -> Result<ResponseOutcome, AppError> {
        validate_response(&response)?;

        let _guard = self.locks.acquire(offer_id).await;
        let mut offer = self.load_offer(offer_id)?;

        if !self
            .stores
            .responses
            .record_response_key(offer_id, &response.idempotency_key)?
        {
            self.metrics.duplicate_responses_total.inc();
            info!(
                offer_id = %offer_id,
                idempotency_key = %response.idempotency_key,
                "duplicate driver response ignored"
            );
            return Ok(ResponseOutcome::Duplicate);
        }

        let target = match response.action {
            DriverAction::Accept => OfferStatus::Booked,
            DriverAction::Counter => OfferStatus::Negotiating,
            DriverAction::Decline => OfferStatus::RoutingToCandidates,
        };
        if !offer.status.awaits_candidate() {
            return Err(AppError::InvalidTransition {
                from: offer.status,
                to: target,
            });
        }
        self.ensure_active_holder(&offer, &response.driver_id)?;

        self.metrics
            .driver_responses_total
            .with_label_values(&[response.action.as_str()])
            .inc();
        info!(
            offer_id = %offer_id,
            driver_id = %response.driver_id,
            action = response.action.as_str(),
            "driver response received"
        );

        match response.action {
            DriverAction::Accept => {
                self.stores.negotiations.append_negotiation(Negotiation::new(
                    offer_id,
                    &response.driver_id,
                    NegotiationStatus::Accepted,
                ))?;
                self.book(&mut offer, &response.driver_id, "driver_accept")?;
            }
            DriverAction::Counter => {
                // Validated above.
                let counter_rate = response.counter_rate.unwrap_or_default();
                // NEGOTIATING always has a COUNTERED row behind it.
                self.stores.negotiations.append_negotiation(
                    Negotiation::new(offer_id, &response.driver_id, NegotiationStatus::Countered)
                        .with_counter_rate(counter_rate),
                )?;
                offer.awaiting_since = None;
                self.transition(
                    &mut offer,
                    OfferStatus::Negotiating,
                    extra([
                        ("candidate_id", json!(response.driver_id)),
                        ("counter_rate", json!(counter_rate)),
                    ]),
                )?;
                self.notifier.dispatch(Notification::CounterToBroker {
                    offer_id,
                    broker_id: offer.broker_id.clone(),
                    candidate_id: response.driver_id.clone(),
                    counter_rate,
                });
            }
            DriverAction::Decline => {
                self.decline_and_reroute(offer, &response.driver_id, "driver_decline")?;
                return Ok(ResponseOutcome::Applied {
                    status: OfferStatus::OfferSent,
                });
            }
        }

        Ok(ResponseOutcome::Applied {
            status: offer.status,
        })
    }

    /// Resolves an outstanding counter on the broker's behalf.
    pub async fn handle_broker_decision(
        &self,
        offer_id: Uuid,
        decision: BrokerDecision,
    ) -> Result<Offer, AppError> {
        if let BrokerDecision::Revise { rate } = decision {
            if !rate.is_finite() || rate <= 0.0 {
                return Err(AppError::invalid_rate(rate));
            }
        }

        let _guard = self.locks.acquire(offer_id).await;
        let mut offer = self.load_offer(offer_id)?;

        let target = match decision {
            BrokerDecision::AcceptCounter => OfferStatus::Booked,
            _ => OfferStatus::WaitingResponse,
        };
        if offer.status != OfferStatus::Negotiating {
            return Err(AppError::InvalidTransition {
                from: offer.status,
                to: target,
            });
        }

        let active = self.active_negotiation(offer_id)?;
        let Some(counter) = active.filter(|n| n.status == NegotiationStatus::Countered) else {
            return Err(AppError::Conflict(format!(
                "offer {offer_id} has no outstanding counter"
            )));
        };
        let candidate_id = counter.candidate_id.clone();

        match decision {
            BrokerDecision::AcceptCounter => {
                let rate = counter.counter_rate.unwrap_or(offer.rate);
                offer.rate = rate;
                self.stores.negotiations.append_negotiation(
                    Negotiation::new(offer_id, &candidate_id, NegotiationStatus::Accepted)
                        .with_counter_rate(rate),
                )?;
                self.book(&mut offer, &candidate_id, "broker_accept_counter")?;
            }
            BrokerDecision::RejectCounter => {
                self.reopen(&mut offer, &candidate_id, "counter rejected; standing rate")?;
            }
            BrokerDecision::Revise { rate } => {
                offer.rate = rate;
                self.reopen(&mut offer, &candidate_id, "broker revised rate")?;
            }
        }

        Ok(offer)
    }

    /// Re-routes every offer whose candidate has not answered within the
    /// response deadline. Returns the ids of the offers that were expired.
    pub async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, AppError> {
        let waiting = self
            .stores
            .offers
            .offers_with_status(&[OfferStatus::OfferSent, OfferStatus::WaitingResponse])?;

        let mut expired = Vec::new();

        for stale in waiting.into_iter().filter(|offer| self.is_overdue(offer, now)) {
            let _guard = self.locks.acquire(stale.id).await;

            // Re-read under the lock: a response may have landed meanwhile.
            let offer = self.load_offer(stale.id)?;
            if !offer.status.awaits_candidate() || !self.is_overdue(&offer, now) {
                continue;
            }
            let Some(candidate_id) = offer.assigned_candidate.clone() else {
                continue;
            };

            warn!(
                offer_id = %offer.id,
                candidate_id = %candidate_id,
                "response deadline elapsed; re-routing"
            );

            match self.decline_and_reroute(offer, &candidate_id, DEADLINE_ELAPSED) {
                Ok(_) | Err(AppError::NoEligibleCandidates(_)) => expired.push(stale.id),
                Err(err) => {
                    error!(offer_id = %stale.id, error = %err, "failed to expire offer");
                }
            }
        }

        Ok(expired)
    }

    fn is_overdue(&self, offer: &Offer, now: DateTime<Utc>) -> bool {
        offer
            .awaiting_since
            .is_some_and(|since| since + self.response_timeout <= now)
    }

    fn load_offer(&self, offer_id: Uuid) -> Result<Offer, AppError> {
        self.stores
            .offers
            .fetch_offer(offer_id)?
            .ok_or_else(|| AppError::NotFound(format!("offer {offer_id} not found")))
    }

    fn active_negotiation(&self, offer_id: Uuid) -> Result<Option<Negotiation>, AppError> {
        let rows = self.stores.negotiations.negotiations_for(offer_id)?;
        Ok(rows.into_iter().last().filter(|n| n.status.is_active()))
    }

    fn ensure_active_holder(&self, offer: &Offer, driver_id: &str) -> Result<(), AppError> {
        match self.active_negotiation(offer.id)? {
            Some(active) if active.candidate_id == driver_id => Ok(()),
            _ => Err(AppError::Conflict(format!(
                "driver {driver_id} does not hold the active negotiation for offer {}",
                offer.id
            ))),
        }
    }

    /// Picks the best remaining candidate and sends them the offer. Must be
    /// called with the offer's lock held.
    fn route(&self, mut offer: Offer) -> Result<RoutingDecision, AppError> {
        if offer.status != OfferStatus::RoutingToCandidates {
            return Err(AppError::InvalidTransition {
                from: offer.status,
                to: OfferStatus::OfferSent,
            });
        }

        let reason = if self.stores.negotiations.negotiations_for(offer.id)?.is_empty() {
            RunReason::NewOffer
        } else {
            RunReason::ReRoute
        };

        let outcome = self
            .matcher
            .run_for_offer(&offer, reason, &offer.declined_by)?;

        let Some(winner) = outcome.ranked.first() else {
            return self.escalate(offer, outcome.run.id);
        };

        self.stores.negotiations.append_negotiation(Negotiation::new(
            offer.id,
            &winner.candidate_id,
            NegotiationStatus::Pending,
        ))?;

        offer.assigned_candidate = Some(winner.candidate_id.clone());
        offer.awaiting_since = Some(Utc::now());
        if let Err(err) = self.transition(
            &mut offer,
            OfferStatus::OfferSent,
            extra([
                ("assignee", json!(winner.candidate_id)),
                ("match_run_id", json!(outcome.run.id)),
                ("total_score", json!(winner.total_score)),
            ]),
        ) {
            self.withdraw_pending(offer.id, &winner.candidate_id);
            return Err(err);
        }

        info!(
            offer_id = %offer.id,
            candidate_id = %winner.candidate_id,
            total_score = winner.total_score,
            "offer routed to candidate"
        );

        self.notifier.dispatch(Notification::OfferToCandidate {
            offer_id: offer.id,
            candidate_id: winner.candidate_id.clone(),
            rate: offer.rate,
            rate_type: offer.rate_type,
            pickup: offer.pickup,
            dropoff: offer.dropoff,
        });

        Ok(RoutingDecision {
            offer_id: offer.id,
            candidate_id: winner.candidate_id.clone(),
            match_run_id: outcome.run.id,
            total_score: winner.total_score,
        })
    }

    /// Closes a PENDING row whose offer never reached OFFER_SENT, so the
    /// offer is left with no active negotiation.
    fn withdraw_pending(&self, offer_id: Uuid, candidate_id: &str) {
        let closing = Negotiation::new(offer_id, candidate_id, NegotiationStatus::Declined)
            .with_note(ROUTING_ABORTED);

        if let Err(err) = self.stores.negotiations.append_negotiation(closing) {
            error!(
                offer_id = %offer_id,
                candidate_id = %candidate_id,
                error = %err,
                "failed to withdraw pending negotiation"
            );
        }
    }

    fn escalate(&self, mut offer: Offer, match_run_id: Uuid) -> Result<RoutingDecision, AppError> {
        let details = extra([
            ("reason", json!(NO_ELIGIBLE_CANDIDATES)),
            ("match_run_id", json!(match_run_id)),
            ("declined_count", json!(offer.declined_by.len())),
        ]);
        offer.assigned_candidate = None;
        offer.awaiting_since = None;
        self.transition(&mut offer, OfferStatus::Failed, details)?;

        self.metrics.escalations_total.inc();
        warn!(
            offer_id = %offer.id,
            declined = offer.declined_by.len(),
            "no eligible candidates; offer escalated"
        );

        self.notifier.dispatch(Notification::Escalation {
            offer_id: offer.id,
            broker_id: offer.broker_id.clone(),
            reason: NO_ELIGIBLE_CANDIDATES.to_string(),
        });

        Err(AppError::NoEligibleCandidates(offer.id))
    }

    fn decline_and_reroute(
        &self,
        mut offer: Offer,
        candidate_id: &str,
        reason: &str,
    ) -> Result<RoutingDecision, AppError> {
        self.stores.negotiations.append_negotiation(
            Negotiation::new(offer.id, candidate_id, NegotiationStatus::Declined).with_note(reason),
        )?;

        offer.declined_by.insert(candidate_id.to_string());
        offer.assigned_candidate = None;
        offer.awaiting_since = None;
        self.transition(
            &mut offer,
            OfferStatus::RoutingToCandidates,
            extra([
                ("declined_by", json!(candidate_id)),
                ("reason", json!(reason)),
            ]),
        )?;

        self.route(offer)
    }

    fn book(&self, offer: &mut Offer, candidate_id: &str, via: &str) -> Result<(), AppError> {
        let details = extra([
            ("candidate_id", json!(candidate_id)),
            ("rate", json!(offer.rate)),
            ("via", json!(via)),
        ]);
        offer.assigned_candidate = Some(candidate_id.to_string());
        offer.awaiting_since = None;
        self.transition(offer, OfferStatus::Booked, details)?;

        self.notifier.dispatch(Notification::BookingConfirmed {
            offer_id: offer.id,
            broker_id: offer.broker_id.clone(),
            candidate_id: candidate_id.to_string(),
            rate: offer.rate,
        });

        Ok(())
    }

    /// Hands the offer back to the countering candidate at the broker's rate.
    fn reopen(&self, offer: &mut Offer, candidate_id: &str, note: &str) -> Result<(), AppError> {
        self.stores.negotiations.append_negotiation(
            Negotiation::new(offer.id, candidate_id, NegotiationStatus::Pending).with_note(note),
        )?;

        let details = extra([
            ("candidate_id", json!(candidate_id)),
            ("rate", json!(offer.rate)),
            ("note", json!(note)),
        ]);
        offer.awaiting_since = Some(Utc::now());
        self.transition(offer, OfferStatus::WaitingResponse, details)?;

        self.notifier.dispatch(Notification::RateUpdateToCandidate {
            offer_id: offer.id,
            candidate_id: candidate_id.to_string(),
            rate: offer.rate,
        });

        Ok(())
    }

    /// Persists the new status, then appends the transition to the event log.
    /// A failed append is reported but does not undo the transition.
    fn transition(
        &self,
        offer: &mut Offer,
        to: OfferStatus,
        extra: Map<String, Value>,
    ) -> Result<(), AppError> {
        let from = offer.status;
        if !from.can_transition_to(to) {
            return Err(AppError::InvalidTransition { from, to });
        }

        offer.status = to;
        offer.updated_at = Utc::now();
        if let Err(err) = self.stores.offers.update_offer(offer) {
            offer.status = from;
            return Err(err.into());
        }

        self.metrics
            .offer_transitions_total
            .with_label_values(&[to.as_str()])
            .inc();
        info!(offer_id = %offer.id, from = %from, to = %to, "offer transition");

        let payload = TransitionPayload {
            from_state: from,
            to_state: to,
            extra,
        };

        match self.stores.events.append_event(offer.id, payload) {
            Ok(event) => {
                let _ = self.events_tx.send(event);
            }
            Err(err) => {
                self.metrics.event_log_failures_total.inc();
                error!(
                    offer_id = %offer.id,
                    from = %from,
                    to = %to,
                    error = %err,
                    "failed to append offer event"
                );
            }
        }

        Ok(())
    }
}

fn new_offer(payload: OfferPayload) -> Offer {
    let now = Utc::now();

    Offer {
        id: Uuid::new_v4(),
        broker_id: payload.broker_id.trim().to_string(),
        pickup: payload.pickup,
        dropoff: payload.dropoff,
        rate: payload.rate,
        rate_type: payload.rate_type,
        required_tags: payload.required_tags,
        status: OfferStatus::NewOfferCaptured,
        source_call_id: payload.source_call_id,
        assigned_candidate: None,
        declined_by: Default::default(),
        awaiting_since: None,
        created_at: now,
        updated_at: now,
    }
}

fn validate_payload(payload: &OfferPayload) -> Result<(), AppError> {
    if !payload.rate.is_finite() || payload.rate <= 0.0 {
        return Err(AppError::invalid_rate(payload.rate));
    }
    if payload.broker_id.trim().is_empty() {
        return Err(AppError::Validation("broker_id cannot be empty".to_string()));
    }
    if !payload.pickup.is_valid() || !payload.dropoff.is_valid() {
        return Err(AppError::Validation(
            "pickup and dropoff must be valid coordinates".to_string(),
        ));
    }

    Ok(())
}

fn validate_response(response: &DriverResponse) -> Result<(), AppError> {
    if response.idempotency_key.trim().is_empty() {
        return Err(AppError::Validation("idempotency_key is required".to_string()));
    }
    if response.driver_id.trim().is_empty() {
        return Err(AppError::Validation("driver_id cannot be empty".to_string()));
    }
    if response.action == DriverAction::Counter {
        match response.counter_rate {
            Some(rate) if rate.is_finite() && rate > 0.0 => {}
            Some(rate) => return Err(AppError::invalid_rate(rate)),
            None => {
                return Err(AppError::Validation(
                    "counter_rate is required for COUNTER".to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn extra<const N: usize>(fields: [(&str, Value); N]) -> Map<String, Value> {
    fields
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}
