//! Outcome Check Scheduler
//!
//! Runs the deferred market-cap checks for each emitted alert:
//! cancellable tokio sleepers per checkpoint, bounded fetch retries,
//! and classification after the final checkpoint. The scheduler is the
//! single writer of wallet scores - the feedback edge into the filter
//! pipeline.
//!
//! Scheduling metadata stays in the pending map until an evaluation
//! completes, so a shutdown mid-sleep loses nothing: the host persists
//! the map and reschedules on restart.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, RwLock};

use crate::domain::alert::AlertRecord;
use crate::domain::outcome::{
    CheckPoint, OutcomeClass, OutcomeConfig, OutcomeEvaluation, PendingCheck, CHECK_POINTS,
};
use crate::domain::wallet_score::ScoreBook;
use crate::ports::token_data::TokenDataPort;

use super::unix_now;

/// Deferred outcome evaluation runner
#[derive(Clone)]
pub struct OutcomeScheduler {
    token_data: Arc<dyn TokenDataPort>,
    config: OutcomeConfig,
    check_backoff: Duration,
    /// Checkpoint schedule - the standard one in production, compressed
    /// offsets under test
    checkpoints: Arc<Vec<CheckPoint>>,
    scores: Arc<RwLock<ScoreBook>>,
    alerts: Arc<RwLock<Vec<AlertRecord>>>,
    pending: Arc<RwLock<HashMap<u64, PendingCheck>>>,
    shutdown: watch::Receiver<bool>,
}

impl OutcomeScheduler {
    pub fn new(
        token_data: Arc<dyn TokenDataPort>,
        config: OutcomeConfig,
        check_backoff: Duration,
        scores: Arc<RwLock<ScoreBook>>,
        alerts: Arc<RwLock<Vec<AlertRecord>>>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            token_data,
            config,
            check_backoff,
            checkpoints: Arc::new(CHECK_POINTS.to_vec()),
            scores,
            alerts,
            pending: Arc::new(RwLock::new(HashMap::new())),
            shutdown,
        }
    }

    /// Override the checkpoint schedule (tests compress the offsets).
    pub fn with_checkpoints(mut self, checkpoints: Vec<CheckPoint>) -> Self {
        self.checkpoints = Arc::new(checkpoints);
        self
    }

    /// Schedule the outcome evaluation for a fresh alert.
    pub async fn schedule(&self, check: PendingCheck) {
        self.pending
            .write()
            .await
            .insert(check.alert_id, check.clone());
        tracing::debug!(
            "Outcome checks scheduled for alert {} ({})",
            check.alert_id,
            check.token_mint
        );
        let scheduler = self.clone();
        tokio::spawn(async move {
            scheduler.run_evaluation(check).await;
        });
    }

    /// Reschedule persisted checks after a restart. Checkpoints whose
    /// deadline already passed run at the next pass.
    pub async fn restore(&self, checks: Vec<PendingCheck>) {
        for check in checks {
            tracing::info!(
                "Restoring outcome checks for alert {} ({})",
                check.alert_id,
                check.token_mint
            );
            self.schedule(check).await;
        }
    }

    /// Scheduling metadata for every evaluation still in flight.
    pub async fn pending_checks(&self) -> Vec<PendingCheck> {
        self.pending.read().await.values().cloned().collect()
    }

    async fn run_evaluation(mut self, check: PendingCheck) {
        let mut eval = OutcomeEvaluation::new(check.alert_mcap);
        let checkpoints = self.checkpoints.clone();

        for checkpoint in checkpoints.iter() {
            let deadline = check.trigger_timestamp + checkpoint.offset_secs;
            if !self.sleep_until(deadline).await {
                // Cancelled - pending metadata stays for reconstruction
                tracing::info!(
                    "Outcome checks cancelled for alert {} (shutdown)",
                    check.alert_id
                );
                return;
            }

            match self.fetch_with_retries(&check.token_mint).await {
                Some(stats) => {
                    eval.record(checkpoint.kind, stats.market_cap_usd);
                    tracing::debug!(
                        "Outcome check +{}s for {}: mcap ${:.0}",
                        checkpoint.offset_secs,
                        check.token_mint,
                        stats.market_cap_usd
                    );
                }
                None => eval.record_missed(checkpoint.kind),
            }
        }

        let class = eval.classify(&self.config);
        self.apply(&check, class, &eval).await;
    }

    /// Apply a finished evaluation: alert status, wallet scores, and
    /// the pending map.
    async fn apply(&self, check: &PendingCheck, class: OutcomeClass, eval: &OutcomeEvaluation) {
        {
            let mut alerts = self.alerts.write().await;
            if let Some(record) = alerts.iter_mut().find(|a| a.id == check.alert_id) {
                record.apply_outcome(class);
            }
        }

        {
            let mut scores = self.scores.write().await;
            for wallet in &check.wallets {
                scores.record_outcome(wallet, class);
            }
        }

        self.pending.write().await.remove(&check.alert_id);

        tracing::info!(
            "Alert {} ({}) classified {:?}: 5min {:+.1}%, 30min {:+.1}%, ath ${:.0}",
            check.alert_id,
            check.token_mint,
            class,
            eval.change_5min().unwrap_or(0.0) * 100.0,
            eval.change_30min().unwrap_or(0.0) * 100.0,
            eval.ath_mcap
        );
    }

    /// Sleep until a unix deadline, returning false if shutdown fired
    /// first. Deadlines in the past return immediately.
    async fn sleep_until(&mut self, deadline: u64) -> bool {
        if *self.shutdown.borrow() {
            return false;
        }
        let now = unix_now();
        if deadline <= now {
            return true;
        }
        let wait = Duration::from_secs(deadline - now);
        tokio::select! {
            _ = tokio::time::sleep(wait) => true,
            _ = self.shutdown.changed() => !*self.shutdown.borrow(),
        }
    }

    /// Bounded-retry stats fetch. `None` after exhausting retries.
    async fn fetch_with_retries(&self, mint: &str) -> Option<crate::domain::TokenStats> {
        for attempt in 0..self.config.check_retries.max(1) {
            match self.token_data.token_stats(mint).await {
                Ok(stats) => return Some(stats),
                Err(e) => {
                    tracing::warn!(
                        "Outcome stats fetch failed for {} (attempt {}): {}",
                        mint,
                        attempt + 1,
                        e
                    );
                    if attempt + 1 < self.config.check_retries.max(1) {
                        tokio::time::sleep(self.check_backoff).await;
                    }
                }
            }
        }
        None
    }
}
