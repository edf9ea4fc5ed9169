use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub match_runs_total: IntCounterVec,
    pub match_latency_seconds: HistogramVec,
    pub offer_transitions_total: IntCounterVec,
    pub driver_responses_total: IntCounterVec,
    pub duplicate_responses_total: IntCounter,
    pub escalations_total: IntCounter,
    pub event_log_failures_total: IntCounter,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let match_runs_total = IntCounterVec::new(
            Opts::new("match_runs_total", "Total persisted match runs by run reason"),
            &["reason"],
        )
        .expect("valid match_runs_total metric");

        let match_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "match_latency_seconds",
                "Latency of scoring and persisting a match run in seconds",
            ),
            &["outcome"],
        )
        .expect("valid match_latency_seconds metric");

        let offer_transitions_total = IntCounterVec::new(
            Opts::new("offer_transitions_total", "Offer state transitions by target state"),
            &["to_state"],
        )
        .expect("valid offer_transitions_total metric");

        let driver_responses_total = IntCounterVec::new(
            Opts::new("driver_responses_total", "Applied driver responses by action"),
            &["action"],
        )
        .expect("valid driver_responses_total metric");

        let duplicate_responses_total = IntCounter::new(
            "duplicate_responses_total",
            "Driver responses ignored because their idempotency key was already seen",
        )
        .expect("valid duplicate_responses_total metric");

        let escalations_total = IntCounter::new(
            "escalations_total",
            "Offers escalated because no eligible candidate remained",
        )
        .expect("valid escalations_total metric");

        let event_log_failures_total = IntCounter::new(
            "event_log_failures_total",
            "Offer events that could not be appended to the event log",
        )
        .expect("valid event_log_failures_total metric");

        registry
            .register(Box::new(match_runs_total.clone()))
            .expect("register match_runs_total");
        registry
            .register(Box::new(match_latency_seconds.clone()))
            .expect("register match_latency_seconds");
        registry
            .register(Box::new(offer_transitions_total.clone()))
            .expect("register offer_transitions_total");
        registry
            .register(Box::new(driver_responses_total.clone()))
            .expect("register driver_responses_total");
        registry
            .register(Box::new(duplicate_responses_total.clone()))
            .expect("register duplicate_responses_total");
        registry
            .register(Box::new(escalations_total.clone()))
            .expect("register escalations_total");
        registry
            .register(Box::new(event_log_failures_total.clone()))
            .expect("register event_log_failures_total");

        Self {
            registry,
            match_runs_total,
            match_latency_seconds,
            offer_transitions_total,
            driver_responses_total,
            duplicate_responses_total,
            escalations_total,
            event_log_failures_total,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
