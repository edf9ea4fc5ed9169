use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::engine::booking::BookingEngine;

/// Periodically re-routes offers whose candidate let the response deadline pass.
pub async fn run_deadline_sweeper(engine: Arc<BookingEngine>, every: Duration) {
    info!(interval_secs = every.as_secs(), "response deadline sweeper started");

    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        match engine.expire_overdue(Utc::now()).await {
            Ok(expired) if !expired.is_empty() => {
                info!(count = expired.len(), "expired offers re-routed");
            }
            Ok(_) => {}
            Err(err) => error!(error = %err, "deadline sweep failed"),
        }
    }
}
