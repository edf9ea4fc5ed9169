use std::collections::BTreeSet;

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::candidate::{Availability, Candidate};
use crate::models::event::{OfferEvent, OfferEventType, TransitionPayload};
use crate::models::match_run::{MatchCandidate, MatchRun};
use crate::models::negotiation::Negotiation;
use crate::models::offer::{Offer, OfferStatus};
use crate::store::{
    CandidateStore, EventLog, MatchRunStore, NegotiationStore, OfferStore, ResponseLedger,
    StoreError,
};

#[derive(Default)]
pub struct MemoryStore {
    offers: DashMap<Uuid, Offer>,
    candidates: DashMap<String, Candidate>,
    match_runs: DashMap<Uuid, (MatchRun, Vec<MatchCandidate>)>,
    negotiations: DashMap<Uuid, Vec<Negotiation>>,
    events: DashMap<Uuid, Vec<OfferEvent>>,
    response_keys: DashMap<(Uuid, String), ()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_candidate(&self, candidate: Candidate) {
        self.candidates.insert(candidate.id.clone(), candidate);
    }

    pub fn set_candidate_status(
        &self,
        id: &str,
        status: Availability,
    ) -> Result<Candidate, StoreError> {
        let mut candidate = self
            .candidates
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("candidate {id}")))?;

        candidate.status = status;
        candidate.updated_at = Utc::now();

        Ok(candidate.clone())
    }

    pub fn offer_count(&self) -> usize {
        self.offers.len()
    }

    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    pub fn match_run_count(&self) -> usize {
        self.match_runs.len()
    }
}

impl CandidateStore for MemoryStore {
    fn candidate_pool(
        &self,
        limit: usize,
        excluded: &BTreeSet<String>,
    ) -> Result<Vec<Candidate>, StoreError> {
        let mut pool: Vec<Candidate> = self
            .candidates
            .iter()
            .filter(|entry| !excluded.contains(entry.key()))
            .map(|entry| entry.value().clone())
            .collect();

        pool.sort_by(|a, b| a.id.cmp(&b.id));
        pool.truncate(limit);
        Ok(pool)
    }
}

impl OfferStore for MemoryStore {
    fn insert_offer(&self, offer: Offer) -> Result<(), StoreError> {
        match self.offers.entry(offer.id) {
            Entry::Occupied(_) => Err(StoreError::Conflict(format!("offer {}", offer.id))),
            Entry::Vacant(slot) => {
                slot.insert(offer);
                Ok(())
            }
        }
    }

    fn update_offer(&self, offer: &Offer) -> Result<(), StoreError> {
        let mut existing = self
            .offers
            .get_mut(&offer.id)
            .ok_or_else(|| StoreError::NotFound(format!("offer {}", offer.id)))?;

        *existing = offer.clone();
        Ok(())
    }

    fn fetch_offer(&self, id: Uuid) -> Result<Option<Offer>, StoreError> {
        Ok(self.offers.get(&id).map(|entry| entry.value().clone()))
    }

    fn offers_with_status(&self, statuses: &[OfferStatus]) -> Result<Vec<Offer>, StoreError> {
        let mut offers: Vec<Offer> = self
            .offers
            .iter()
            .filter(|entry| statuses.contains(&entry.value().status))
            .map(|entry| entry.value().clone())
            .collect();

        offers.sort_by_key(|offer| offer.created_at);
        Ok(offers)
    }
}

impl MatchRunStore for MemoryStore {
    fn record_run(&self, run: MatchRun, candidates: Vec<MatchCandidate>) -> Result<(), StoreError> {
        if candidates.iter().any(|c| c.match_run_id != run.id) {
            return Err(StoreError::Conflict(format!(
                "match candidates do not belong to run {}",
                run.id
            )));
        }

        match self.match_runs.entry(run.id) {
            Entry::Occupied(_) => Err(StoreError::Conflict(format!("match run {}", run.id))),
            Entry::Vacant(slot) => {
                slot.insert((run, candidates));
                Ok(())
            }
        }
    }

    fn fetch_run(&self, id: Uuid) -> Result<Option<(MatchRun, Vec<MatchCandidate>)>, StoreError> {
        Ok(self.match_runs.get(&id).map(|entry| entry.value().clone()))
    }

    fn runs_for_offer(&self, offer_id: Uuid) -> Result<Vec<MatchRun>, StoreError> {
        let mut runs: Vec<MatchRun> = self
            .match_runs
            .iter()
            .filter(|entry| entry.value().0.offer_id == offer_id)
            .map(|entry| entry.value().0.clone())
            .collect();

        runs.sort_by_key(|run| run.created_at);
        Ok(runs)
    }
}

impl NegotiationStore for MemoryStore {
    fn append_negotiation(&self, negotiation: Negotiation) -> Result<(), StoreError> {
        self.negotiations
            .entry(negotiation.offer_id)
            .or_default()
            .push(negotiation);
        Ok(())
    }

    fn negotiations_for(&self, offer_id: Uuid) -> Result<Vec<Negotiation>, StoreError> {
        Ok(self
            .negotiations
            .get(&offer_id)
            .map(|rows| rows.value().clone())
            .unwrap_or_default())
    }
}

impl EventLog for MemoryStore {
    fn append_event(&self, offer_id: Uuid, payload: TransitionPayload) -> Result<OfferEvent, StoreError> {
        let mut log = self.events.entry(offer_id).or_default();

        let event = OfferEvent {
            id: Uuid::new_v4(),
            offer_id,
            sequence: log.len() as u64 + 1,
            event_type: OfferEventType::StateChange,
            payload,
            recorded_at: Utc::now(),
        };

        log.push(event.clone());
        Ok(event)
    }

    fn events_for(&self, offer_id: Uuid) -> Result<Vec<OfferEvent>, StoreError> {
        Ok(self
            .events
            .get(&offer_id)
            .map(|log| log.value().clone())
            .unwrap_or_default())
    }
}

impl ResponseLedger for MemoryStore {
    fn record_response_key(&self, offer_id: Uuid, key: &str) -> Result<bool, StoreError> {
        match self.response_keys.entry((offer_id, key.to_string())) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(());
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::Utc;
    use serde_json::Map;
    use uuid::Uuid;

    use super::MemoryStore;
    use crate::models::candidate::{Availability, Candidate, GeoPoint};
    use crate::models::event::TransitionPayload;
    use crate::models::match_run::{MatchRun, RunReason, ALGORITHM_VERSION};
    use crate::models::offer::OfferStatus;
    use crate::store::{CandidateStore, EventLog, MatchRunStore, ResponseLedger};

    fn candidate(id: &str) -> Candidate {
        Candidate {
            id: id.to_string(),
            location: GeoPoint { lat: 35.0, lng: -97.0 },
            service_radius_miles: 200.0,
            equipment_tags: BTreeSet::new(),
            status: Availability::AvailableNow,
            trust_score: 70.0,
            response_avg_secs: 120.0,
            cancel_rate: 0.05,
            updated_at: Utc::now(),
        }
    }

    fn run(offer_id: Uuid) -> MatchRun {
        MatchRun {
            id: Uuid::new_v4(),
            offer_id,
            reason: RunReason::NewOffer,
            algorithm_version: ALGORITHM_VERSION.to_string(),
            pool_size: 0,
            excluded: Vec::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn candidate_pool_is_ordered_and_bounded() {
        let store = MemoryStore::new();
        for id in ["op-c", "op-a", "op-b"] {
            store.upsert_candidate(candidate(id));
        }

        let pool = store.candidate_pool(2, &BTreeSet::new()).unwrap();
        let ids: Vec<&str> = pool.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["op-a", "op-b"]);
    }

    #[test]
    fn excluded_candidates_do_not_use_pool_slots() {
        let store = MemoryStore::new();
        for id in ["op-a", "op-b", "op-c"] {
            store.upsert_candidate(candidate(id));
        }

        let excluded = BTreeSet::from(["op-a".to_string(), "op-b".to_string()]);
        let pool = store.candidate_pool(1, &excluded).unwrap();
        let ids: Vec<&str> = pool.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["op-c"]);
    }

    #[test]
    fn match_runs_cannot_be_rewritten() {
        let store = MemoryStore::new();
        let first = run(Uuid::new_v4());

        store.record_run(first.clone(), Vec::new()).unwrap();
        assert!(store.record_run(first, Vec::new()).is_err());
    }

    #[test]
    fn event_sequence_is_per_offer() {
        let store = MemoryStore::new();
        let offer_a = Uuid::new_v4();
        let offer_b = Uuid::new_v4();
        let payload = TransitionPayload {
            from_state: OfferStatus::NewOfferCaptured,
            to_state: OfferStatus::RoutingToCandidates,
            extra: Map::new(),
        };

        assert_eq!(store.append_event(offer_a, payload.clone()).unwrap().sequence, 1);
        assert_eq!(store.append_event(offer_a, payload.clone()).unwrap().sequence, 2);
        assert_eq!(store.append_event(offer_b, payload).unwrap().sequence, 1);
    }

    #[test]
    fn response_key_is_recorded_once() {
        let store = MemoryStore::new();
        let offer_id = Uuid::new_v4();

        assert!(store.record_response_key(offer_id, "sms-1").unwrap());
        assert!(!store.record_response_key(offer_id, "sms-1").unwrap());
        assert!(store.record_response_key(Uuid::new_v4(), "sms-1").unwrap());
    }

    #[test]
    fn status_update_for_unknown_candidate_fails() {
        let store = MemoryStore::new();
        assert!(store.set_candidate_status("ghost", Availability::Offline).is_err());
    }
}
