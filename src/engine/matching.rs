use std::collections::BTreeSet;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::engine::scoring::{ScoredCandidate, ScoringEngine};
use crate::error::AppError;
use crate::models::match_run::{
    MatchCandidate, MatchRun, RankedCandidate, RunReason, ALGORITHM_VERSION,
};
use crate::models::offer::Offer;
use crate::observability::metrics::Metrics;
use crate::store::Stores;

pub const SHORTLIST_SIZE: usize = 3;

#[derive(Debug, Clone, Serialize)]
pub struct MatchOutcome {
    pub run: MatchRun,
    pub ranked: Vec<RankedCandidate>,
}

/// Scores a bounded candidate pool against an offer and records the ranked
/// shortlist as an immutable match run.
#[derive(Clone)]
pub struct MatchOrchestrator {
    stores: Stores,
    scoring: ScoringEngine,
    pool_limit: usize,
    metrics: Metrics,
}

impl MatchOrchestrator {
    pub fn new(stores: Stores, scoring: ScoringEngine, pool_limit: usize, metrics: Metrics) -> Self {
        Self {
            stores,
            scoring,
            pool_limit,
            metrics,
        }
    }

    pub fn run_match(&self, offer_id: Uuid, reason: RunReason) -> Result<MatchOutcome, AppError> {
        let offer = self
            .stores
            .offers
            .fetch_offer(offer_id)?
            .ok_or_else(|| AppError::NotFound(format!("offer {offer_id} not found")))?;

        self.run_for_offer(&offer, reason, &BTreeSet::new())
    }

    pub fn run_for_offer(
        &self,
        offer: &Offer,
        reason: RunReason,
        excluded: &BTreeSet<String>,
    ) -> Result<MatchOutcome, AppError> {
        let start = Instant::now();
        let result = self.score_and_record(offer, reason, excluded);

        let outcome = if result.is_ok() { "success" } else { "error" };
        self.metrics
            .match_latency_seconds
            .with_label_values(&[outcome])
            .observe(start.elapsed().as_secs_f64());

        result
    }

    fn score_and_record(
        &self,
        offer: &Offer,
        reason: RunReason,
        excluded: &BTreeSet<String>,
    ) -> Result<MatchOutcome, AppError> {
        let pool = self
            .stores
            .candidates
            .candidate_pool(self.pool_limit, excluded)?;

        let scored: Vec<ScoredCandidate> = pool
            .iter()
            .map(|candidate| self.scoring.score(candidate, offer))
            .collect();

        for blocked in scored.iter().filter(|c| c.is_blocked()) {
            debug!(
                offer_id = %offer.id,
                candidate_id = %blocked.candidate_id,
                reason = ?blocked.hard_block_reason.as_ref().map(|b| b.to_string()),
                "candidate hard-blocked"
            );
        }

        let ranked = rank_candidates(scored, SHORTLIST_SIZE);

        let run = MatchRun {
            id: Uuid::new_v4(),
            offer_id: offer.id,
            reason,
            algorithm_version: ALGORITHM_VERSION.to_string(),
            pool_size: pool.len(),
            excluded: excluded.iter().cloned().collect(),
            created_at: Utc::now(),
        };

        let rows = ranked
            .iter()
            .map(|c| MatchCandidate {
                match_run_id: run.id,
                candidate_id: c.candidate_id.clone(),
                rank: c.rank,
                total_score: c.total_score,
                breakdown: c.breakdown,
            })
            .collect();

        self.stores.match_runs.record_run(run.clone(), rows)?;

        self.metrics
            .match_runs_total
            .with_label_values(&[reason.as_str()])
            .inc();

        info!(
            offer_id = %offer.id,
            match_run_id = %run.id,
            reason = reason.as_str(),
            pool_size = run.pool_size,
            shortlisted = ranked.len(),
            "match run recorded"
        );

        Ok(MatchOutcome { run, ranked })
    }
}

/// Drops blocked candidates and orders the rest by score, highest first.
/// Equal scores fall back to ascending candidate id.
pub fn rank_candidates(scored: Vec<ScoredCandidate>, limit: usize) -> Vec<RankedCandidate> {
    let mut eligible: Vec<ScoredCandidate> =
        scored.into_iter().filter(|c| !c.is_blocked()).collect();

    eligible.sort_by(|a, b| {
        b.total_score
            .cmp(&a.total_score)
            .then_with(|| a.candidate_id.cmp(&b.candidate_id))
    });

    eligible
        .into_iter()
        .filter_map(|c| c.breakdown.map(|breakdown| (c.candidate_id, c.total_score, breakdown)))
        .take(limit)
        .enumerate()
        .map(|(index, (candidate_id, total_score, breakdown))| RankedCandidate {
            candidate_id,
            rank: index as u32 + 1,
            total_score,
            breakdown,
        })
        .collect()
}
