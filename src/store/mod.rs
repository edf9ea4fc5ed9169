//! Persistence seams. Every engine receives these as trait objects so the
//! booking pipeline can run against the in-memory store or a real database.

pub mod memory;

use std::collections::BTreeSet;
use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::models::candidate::Candidate;
use crate::models::event::{OfferEvent, TransitionPayload};
use crate::models::match_run::{MatchCandidate, MatchRun};
use crate::models::negotiation::Negotiation;
use crate::models::offer::{Offer, OfferStatus};

pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record already exists: {0}")]
    Conflict(String),
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Read-only view of escort profiles owned by another system.
pub trait CandidateStore: Send + Sync {
    /// Candidate pool in ascending id order, skipping `excluded` before the
    /// `limit` is applied.
    fn candidate_pool(
        &self,
        limit: usize,
        excluded: &BTreeSet<String>,
    ) -> Result<Vec<Candidate>, StoreError>;
}

pub trait OfferStore: Send + Sync {
    fn insert_offer(&self, offer: Offer) -> Result<(), StoreError>;
    fn update_offer(&self, offer: &Offer) -> Result<(), StoreError>;
    fn fetch_offer(&self, id: Uuid) -> Result<Option<Offer>, StoreError>;
    fn offers_with_status(&self, statuses: &[OfferStatus]) -> Result<Vec<Offer>, StoreError>;
}

pub trait MatchRunStore: Send + Sync {
    /// Writes the run and its ranked candidates as one batch.
    fn record_run(&self, run: MatchRun, candidates: Vec<MatchCandidate>) -> Result<(), StoreError>;
    fn fetch_run(&self, id: Uuid) -> Result<Option<(MatchRun, Vec<MatchCandidate>)>, StoreError>;
    fn runs_for_offer(&self, offer_id: Uuid) -> Result<Vec<MatchRun>, StoreError>;
}

pub trait NegotiationStore: Send + Sync {
    fn append_negotiation(&self, negotiation: Negotiation) -> Result<(), StoreError>;
    /// Rows for the offer in insertion order.
    fn negotiations_for(&self, offer_id: Uuid) -> Result<Vec<Negotiation>, StoreError>;
}

pub trait EventLog: Send + Sync {
    /// Appends a transition, assigning the next per-offer sequence number.
    fn append_event(&self, offer_id: Uuid, payload: TransitionPayload) -> Result<OfferEvent, StoreError>;
    fn events_for(&self, offer_id: Uuid) -> Result<Vec<OfferEvent>, StoreError>;
}

/// Idempotency keys for inbound driver responses.
pub trait ResponseLedger: Send + Sync {
    /// Records the key; returns `false` if it had already been recorded.
    fn record_response_key(&self, offer_id: Uuid, key: &str) -> Result<bool, StoreError>;
}

#[derive(Clone)]
pub struct Stores {
    pub offers: Arc<dyn OfferStore>,
    pub candidates: Arc<dyn CandidateStore>,
    pub match_runs: Arc<dyn MatchRunStore>,
    pub negotiations: Arc<dyn NegotiationStore>,
    pub events: Arc<dyn EventLog>,
    pub responses: Arc<dyn ResponseLedger>,
}

impl Stores {
    pub fn from_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            offers: store.clone(),
            candidates: store.clone(),
            match_runs: store.clone(),
            negotiations: store.clone(),
            events: store.clone(),
            responses: store,
        }
    }
}
