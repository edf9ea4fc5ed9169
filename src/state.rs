use std::sync::Arc;

use crate::config::Config;
use crate::engine::booking::BookingEngine;
use crate::engine::matching::MatchOrchestrator;
use crate::engine::scoring::ScoringEngine;
use crate::notify::{Notifier, TracingNotifier};
use crate::observability::metrics::Metrics;
use crate::store::{MemoryStore, Stores};

pub struct AppState {
    pub store: Arc<MemoryStore>,
    pub engine: Arc<BookingEngine>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self::with_notifier(config, Arc::new(TracingNotifier))
    }

    pub fn with_notifier(config: &Config, notifier: Arc<dyn Notifier>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let stores = Stores::from_memory(store.clone());
        let metrics = Metrics::new();

        let scoring =
            ScoringEngine::with_defaults(config.default_broker_fit, config.default_price_fit);
        let matcher = MatchOrchestrator::new(
            stores.clone(),
            scoring,
            config.candidate_pool_limit,
            metrics.clone(),
        );
        let engine = BookingEngine::new(
            stores,
            matcher,
            notifier,
            metrics.clone(),
            config.response_timeout(),
            config.event_buffer_size,
        );

        Self {
            store,
            engine: Arc::new(engine),
            metrics,
        }
    }
}
