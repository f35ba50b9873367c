//! Correlation Engine
//!
//! The async core that ties the pieces together: signature dedup, the
//! filter pipeline, per-token windows, the alert decision machine,
//! second-stage revalidation, alert emission, and outcome scheduling.
//!
//! Concurrency model: one `Arc<Mutex<TokenSlot>>` per token keyed in a
//! `RwLock` map - a single writer per token at a time, different tokens
//! fully parallel, no global lock on the hot path. Wallet scores sit
//! behind a read-mostly `RwLock`; the filter path only ever takes the
//! read side.
//!
//! Ingest-time decisions (window expiry, cooldown, thresholds) use the
//! event's own timestamp, so a recorded feed replays identically; the
//! maintenance sweep and outcome timers run on wall-clock time.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{watch, Mutex, RwLock};

use crate::config::Config;
use crate::domain::alert::{AlertMachine, AlertPolicy, AlertRecord, AlertStatus};
use crate::domain::event::{BuyEvent, TokenStats};
use crate::domain::filter::{EvalContext, FilterConfig, FilterPipeline, RejectReason, Verdict};
use crate::domain::outcome::{OutcomeConfig, PendingCheck};
use crate::domain::persistence::{StateError, StateSnapshot, STATE_FILE};
use crate::domain::wallet_score::{ScoreBook, ScorerConfig, TrustStatus, WalletScore};
use crate::domain::window::{TokenWindow, WindowState};
use crate::ports::alert_sink::AlertSinkPort;
use crate::ports::event_source::EventSourcePort;
use crate::ports::token_data::TokenDataPort;

use super::scheduler::OutcomeScheduler;
use super::unix_now;

/// Maintenance sweep interval in seconds
const MAINTENANCE_INTERVAL_SECS: u64 = 5;

/// Processed-signature cache capacity; the oldest half is dropped at
/// the limit
const SEEN_SIGNATURES_CAP: usize = 10_000;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Event source error: {0}")]
    Source(String),

    #[error(transparent)]
    State(#[from] StateError),
}

/// Everything the engine needs from the host configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub filter: FilterConfig,
    pub policy: AlertPolicy,
    pub outcome: OutcomeConfig,
    pub scorer: ScorerConfig,
    /// Accumulation window lifetime in seconds
    pub window_secs: u64,
    /// Cluster weight of a soft-blackout wallet
    pub soft_blackout_weight: f64,
    pub revalidation_retries: u32,
    pub revalidation_backoff: Duration,
    pub check_backoff: Duration,
    pub data_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            filter: FilterConfig::default(),
            policy: AlertPolicy::default(),
            outcome: OutcomeConfig::default(),
            scorer: ScorerConfig::default(),
            window_secs: crate::domain::window::DEFAULT_WINDOW_SECS,
            soft_blackout_weight: 0.5,
            revalidation_retries: 3,
            revalidation_backoff: Duration::from_millis(500),
            check_backoff: Duration::from_millis(1_000),
            data_dir: PathBuf::from("data"),
        }
    }
}

impl EngineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            filter: config.filter_config(),
            policy: config.alert_policy(),
            outcome: config.outcome_config(),
            scorer: config.scorer_config(),
            window_secs: config.correlation.window_secs,
            soft_blackout_weight: config.correlation.soft_blackout_weight,
            revalidation_retries: config.correlation.revalidation_retries,
            revalidation_backoff: Duration::from_millis(config.correlation.revalidation_backoff_ms),
            check_backoff: Duration::from_millis(config.outcome.check_backoff_ms),
            data_dir: config.persistence.resolved_data_dir(),
        }
    }
}

/// What happened to an ingested event
#[derive(Debug, Clone, PartialEq)]
pub enum IngestResult {
    /// A filter rule rejected it (normal operation, not an error)
    Rejected(RejectReason),
    /// The token's window is closed (cooldown or mid-revalidation)
    DroppedClosedWindow,
    /// Engine is shutting down, intake stopped
    DroppedShutdown,
    /// Counted into the token's window, below threshold
    Counted,
    /// Counted, crossed threshold, revalidated, alert emitted
    AlertEmitted,
    /// Counted, crossed threshold, revalidation suppressed it
    AlertSuppressed,
}

/// Per-token state: the open window (if any) plus the decision machine.
/// Everything in here is touched only under the slot's mutex.
struct TokenSlot {
    window: Option<TokenWindow>,
    machine: AlertMachine,
}

impl TokenSlot {
    fn new(policy: AlertPolicy) -> Self {
        Self {
            window: None,
            machine: AlertMachine::new(policy),
        }
    }

    /// Evict the window if it aged out while still collecting.
    fn evict_expired(&mut self, now: u64, window_secs: u64) {
        let expired = self
            .window
            .as_ref()
            .map(|w| w.is_expired(now, window_secs))
            .unwrap_or(false);
        if expired {
            if let Some(window) = self.window.as_mut() {
                window.mark_expired();
            }
            self.machine.on_window_expired();
            self.window = None;
        }
    }

    /// Count an accepted buy, opening a window if none is live.
    fn add_buy(&mut self, event: BuyEvent, weight: f64) {
        match self.window.as_mut() {
            Some(window) => window.add(event, weight),
            None => {
                self.machine.on_window_opened();
                self.window = Some(TokenWindow::open(event, weight));
            }
        }
    }
}

/// Bounded set of processed transaction signatures. At capacity the
/// oldest half is dropped, trading a little dedup depth for flat memory.
struct SeenSignatures {
    set: HashSet<String>,
    order: VecDeque<String>,
    cap: usize,
}

impl SeenSignatures {
    fn new(cap: usize) -> Self {
        Self {
            set: HashSet::with_capacity(cap),
            order: VecDeque::with_capacity(cap),
            cap,
        }
    }

    /// Returns true if the signature is new
    fn insert(&mut self, signature: &str) -> bool {
        if self.set.contains(signature) {
            return false;
        }
        self.set.insert(signature.to_string());
        self.order.push_back(signature.to_string());
        if self.order.len() > self.cap {
            for _ in 0..self.cap / 2 {
                if let Some(old) = self.order.pop_front() {
                    self.set.remove(&old);
                }
            }
        }
        true
    }
}

/// The correlation/filter/scoring core. Cheap to clone - all state is
/// shared behind `Arc`s, so ctrl-c handlers and spawned tasks can hold
/// their own handle.
#[derive(Clone)]
pub struct CorrelationEngine {
    config: Arc<EngineConfig>,
    pipeline: Arc<FilterPipeline>,
    token_data: Arc<dyn TokenDataPort>,
    alert_sink: Arc<dyn AlertSinkPort>,
    slots: Arc<RwLock<HashMap<String, Arc<Mutex<TokenSlot>>>>>,
    scores: Arc<RwLock<ScoreBook>>,
    alerts: Arc<RwLock<Vec<AlertRecord>>>,
    scheduler: OutcomeScheduler,
    seen: Arc<Mutex<SeenSignatures>>,
    next_alert_id: Arc<AtomicU64>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl CorrelationEngine {
    pub fn new(
        config: EngineConfig,
        token_data: Arc<dyn TokenDataPort>,
        alert_sink: Arc<dyn AlertSinkPort>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let pipeline = Arc::new(FilterPipeline::new(config.filter));
        let scores = Arc::new(RwLock::new(ScoreBook::new(config.scorer)));
        let alerts = Arc::new(RwLock::new(Vec::new()));
        let scheduler = OutcomeScheduler::new(
            token_data.clone(),
            config.outcome,
            config.check_backoff,
            scores.clone(),
            alerts.clone(),
            shutdown_rx.clone(),
        );

        Self {
            config: Arc::new(config),
            pipeline,
            token_data,
            alert_sink,
            slots: Arc::new(RwLock::new(HashMap::new())),
            scores,
            alerts,
            scheduler,
            seen: Arc::new(Mutex::new(SeenSignatures::new(SEEN_SIGNATURES_CAP))),
            next_alert_id: Arc::new(AtomicU64::new(1)),
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
        }
    }

    /// Swap the outcome scheduler (tests compress its checkpoints).
    pub fn with_scheduler(mut self, scheduler: OutcomeScheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn scheduler(&self) -> &OutcomeScheduler {
        &self.scheduler
    }

    /// Process one normalized buy event end to end.
    pub async fn ingest(&self, event: BuyEvent) -> IngestResult {
        if *self.shutdown_rx.borrow() {
            return IngestResult::DroppedShutdown;
        }

        // Exactly-once consumption per transaction signature
        if !self.seen.lock().await.insert(&event.tx_signature) {
            tracing::debug!("Duplicate signature dropped: {}", event.tx_signature);
            return IngestResult::Rejected(RejectReason::DuplicateSignature);
        }

        // Cheap denylist check first, saving a stats fetch for tokens
        // that can never alert
        if self.pipeline.is_denylisted(&event) {
            tracing::debug!("Rejected {}: denylisted token", event.display_symbol());
            return IngestResult::Rejected(RejectReason::DenylistedToken);
        }

        // At-buy-time stats; fetch failure rejects, never errors
        let stats = self.token_data.token_stats(&event.token_mint).await.ok();

        // Tokens with no per-token state yet get a lock-free pre-check,
        // so rejected noise never allocates a slot
        if !self.slots.read().await.contains_key(&event.token_mint) {
            let wallet_status = self.scores.read().await.status(&event.wallet);
            let ctx = EvalContext {
                already_counted: false,
                wallet_status,
                stats: stats.as_ref(),
            };
            if let Verdict::Reject(reason) = self.pipeline.evaluate(&event, &ctx) {
                tracing::debug!(
                    "Rejected buy {} -> {}: {}",
                    &event.wallet[..event.wallet.len().min(8)],
                    event.display_symbol(),
                    reason
                );
                return IngestResult::Rejected(reason);
            }
        }

        let slot = self.slot(&event.token_mint).await;
        let mut guard = slot.lock().await;
        let now = event.timestamp;

        // Evict a window that aged out below threshold
        guard.evict_expired(now, self.config.window_secs);

        // Events for a closed window (cooldown, mid-revalidation) drop
        if guard.window.is_none() && !guard.machine.may_open_window(now) {
            tracing::debug!(
                "Dropped buy for {}: window closed",
                event.display_symbol()
            );
            return IngestResult::DroppedClosedWindow;
        }

        let wallet_status = self.scores.read().await.status(&event.wallet);
        let ctx = EvalContext {
            already_counted: guard
                .window
                .as_ref()
                .map(|w| w.contains_wallet(&event.wallet))
                .unwrap_or(false),
            wallet_status,
            stats: stats.as_ref(),
        };

        if let Verdict::Reject(reason) = self.pipeline.evaluate(&event, &ctx) {
            tracing::debug!(
                "Rejected buy {} -> {}: {}",
                &event.wallet[..event.wallet.len().min(8)],
                event.display_symbol(),
                reason
            );
            return IngestResult::Rejected(reason);
        }

        let weight = match wallet_status {
            TrustStatus::SoftBlackout => self.config.soft_blackout_weight,
            _ => 1.0,
        };

        guard.add_buy(event.clone(), weight);

        let threshold = guard.machine.effective_threshold(now);
        let (distinct, weighted) = guard
            .window
            .as_ref()
            .map(|w| (w.distinct_wallets(), w.weighted_count()))
            .unwrap_or((0, 0.0));

        tracing::info!(
            "Buy counted: {} -> {} (${:.0}) | {}/{} wallet(s)",
            &event.wallet[..event.wallet.len().min(8)],
            event.display_symbol(),
            event.amount_usd,
            distinct,
            threshold,
        );

        if weighted + 1e-9 < threshold as f64 {
            return IngestResult::Counted;
        }

        // Threshold crossing: close the window and hand it over
        let Some(mut window) = guard.window.take() else {
            return IngestResult::Counted;
        };
        window.mark_alerted();
        guard
            .machine
            .on_threshold_reached(&event.token_mint, window.distinct_wallets());
        drop(guard);

        self.resolve_crossing(slot, window, now).await
    }

    /// Second-stage revalidation and alert emission/suppression.
    async fn resolve_crossing(
        &self,
        slot: Arc<Mutex<TokenSlot>>,
        window: TokenWindow,
        now: u64,
    ) -> IngestResult {
        let token = window.token_mint.clone();

        match self.revalidate(&token).await {
            Revalidation::Passed(stats) => {
                let ticket = {
                    let mut guard = slot.lock().await;
                    let ticket = guard.machine.on_revalidation_passed(now, stats.market_cap_usd);
                    guard.machine.bind_token(&token);
                    ticket
                };

                let id = self.next_alert_id.fetch_add(1, Ordering::SeqCst);
                let record = AlertRecord {
                    id,
                    token_mint: token.clone(),
                    token_symbol: window
                        .entries
                        .first()
                        .and_then(|e| e.event.token_symbol.clone()),
                    wallets_involved: window.wallets(),
                    alert_market_cap: stats.market_cap_usd,
                    trigger_timestamp: now,
                    status: AlertStatus::PendingEval,
                    classification: None,
                    is_bullish: ticket.is_bullish,
                    alert_count: ticket.alert_count,
                    first_alert_mcap: ticket.first_alert_mcap,
                };

                self.alerts.write().await.push(record.clone());

                // Emitted means handed off; delivery retries are the
                // sink's responsibility
                if let Err(e) = self.alert_sink.deliver(&record, &window.events()).await {
                    tracing::error!("Alert sink delivery failed for {}: {}", token, e);
                }

                self.scheduler
                    .schedule(PendingCheck {
                        alert_id: id,
                        token_mint: token.clone(),
                        token_symbol: record.token_symbol.clone(),
                        alert_mcap: stats.market_cap_usd,
                        trigger_timestamp: now,
                        wallets: record.wallets_involved.clone(),
                    })
                    .await;

                tracing::info!(
                    "{} emitted for {}: {} wallet(s), mcap ${:.0}",
                    if record.is_bullish { "Bullish re-alert" } else { "Alert" },
                    token,
                    record.wallets_involved.len(),
                    stats.market_cap_usd
                );
                IngestResult::AlertEmitted
            }
            Revalidation::Failed => {
                {
                    let mut guard = slot.lock().await;
                    guard.machine.on_revalidation_failed(now, &token);
                }
                let mut scores = self.scores.write().await;
                for wallet in window.wallets() {
                    scores.record_fake_alert(&wallet);
                }
                IngestResult::AlertSuppressed
            }
            Revalidation::Unavailable => {
                let mut guard = slot.lock().await;
                guard.machine.on_revalidation_aborted(&token);
                IngestResult::AlertSuppressed
            }
        }
    }

    /// Refetch live stats with bounded backoff and re-check them.
    async fn revalidate(&self, mint: &str) -> Revalidation {
        let attempts = self.config.revalidation_retries.max(1);
        for attempt in 0..attempts {
            match self.token_data.token_stats(mint).await {
                Ok(stats) => {
                    return match self.pipeline.revalidate(&stats) {
                        Verdict::Accept => Revalidation::Passed(stats),
                        Verdict::Reject(reason) => {
                            tracing::warn!("Revalidation failed for {}: {}", mint, reason);
                            Revalidation::Failed
                        }
                    };
                }
                Err(e) => {
                    tracing::warn!(
                        "Revalidation fetch failed for {} (attempt {}): {}",
                        mint,
                        attempt + 1,
                        e
                    );
                    if attempt + 1 < attempts {
                        tokio::time::sleep(self.config.revalidation_backoff).await;
                    }
                }
            }
        }
        Revalidation::Unavailable
    }

    /// Consume an event source until it closes or shutdown is signaled.
    pub async fn run(&self, source: &dyn EventSourcePort) -> Result<(), EngineError> {
        let mut rx = source
            .subscribe()
            .await
            .map_err(|e| EngineError::Source(e.to_string()))?;

        self.spawn_maintenance();

        let mut shutdown = self.shutdown_rx.clone();
        loop {
            tokio::select! {
                maybe = rx.recv() => match maybe {
                    Some(event) => {
                        let _ = self.ingest(event).await;
                    }
                    None => {
                        tracing::info!("Event source closed");
                        break;
                    }
                },
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("Shutdown requested, intake stopped");
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    /// Background sweep: evict aged-out windows and prune settled
    /// per-token state.
    fn spawn_maintenance(&self) {
        let engine = self.clone();
        let mut shutdown = self.shutdown_rx.clone();
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(MAINTENANCE_INTERVAL_SECS));
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        engine.prune(unix_now()).await;
                    }
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
        });
    }

    /// One maintenance pass at `now`.
    pub async fn prune(&self, now: u64) {
        let mut removable = Vec::new();
        {
            let slots = self.slots.read().await;
            for (mint, slot) in slots.iter() {
                let mut guard = slot.lock().await;
                guard.evict_expired(now, self.config.window_secs);
                let window_gone = guard.window.is_none();
                if window_gone && guard.machine.tick(now) {
                    removable.push(mint.clone());
                }
            }
        }

        if !removable.is_empty() {
            let mut slots = self.slots.write().await;
            for mint in removable {
                let Some(slot) = slots.get(&mint).cloned() else {
                    continue;
                };
                // Re-check under the write lock; skip if busy
                if let Ok(guard) = slot.try_lock() {
                    if guard.window.is_none() && guard.machine.cooldown_entry().is_none() {
                        drop(guard);
                        slots.remove(&mint);
                        tracing::debug!("Pruned settled token state: {}", mint);
                    }
                }
            }
        }
    }

    /// Signal shutdown: stop intake, cancel outcome sleepers (their
    /// metadata survives in the pending map).
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Path of the state snapshot file.
    pub fn state_path(&self) -> PathBuf {
        self.config.data_dir.join(STATE_FILE)
    }

    /// Restore state from a snapshot file if one exists. Corrupt state
    /// is a fatal error - the caller must not start the engine.
    pub async fn restore_from(&self, path: &Path) -> Result<bool, StateError> {
        let Some(snapshot) = StateSnapshot::load(path)? else {
            return Ok(false);
        };
        self.apply_snapshot(snapshot).await;
        Ok(true)
    }

    /// Install a validated snapshot.
    pub async fn apply_snapshot(&self, snapshot: StateSnapshot) {
        *self.scores.write().await =
            ScoreBook::from_scores(self.config.scorer, snapshot.wallet_scores);

        {
            let mut slots = self.slots.write().await;
            for entry in snapshot.cooldowns {
                let mint = entry.token_mint.clone();
                slots.insert(
                    mint,
                    Arc::new(Mutex::new(TokenSlot {
                        window: None,
                        machine: AlertMachine::with_cooldown(self.config.policy, entry),
                    })),
                );
            }
            for window in snapshot.open_windows {
                let mint = window.token_mint.clone();
                let slot = slots
                    .entry(mint)
                    .or_insert_with(|| Arc::new(Mutex::new(TokenSlot::new(self.config.policy))));
                let mut guard = slot.lock().await;
                guard.machine.on_window_opened();
                guard.window = Some(window);
            }
        }

        let max_id = snapshot.alerts.iter().map(|a| a.id).max().unwrap_or(0);
        self.next_alert_id.store(max_id + 1, Ordering::SeqCst);
        *self.alerts.write().await = snapshot.alerts;

        self.scheduler.restore(snapshot.pending_checks).await;
        tracing::info!("State restored (snapshot from t={})", snapshot.saved_at);
    }

    /// Capture the full core state at `now`.
    pub async fn snapshot(&self, now: u64) -> StateSnapshot {
        let mut snap = StateSnapshot::new(now);
        snap.wallet_scores = self.scores.read().await.scores();

        {
            let slots = self.slots.read().await;
            for (mint, slot) in slots.iter() {
                let guard = slot.lock().await;
                if let Some(window) = &guard.window {
                    if window.state == WindowState::Collecting {
                        snap.open_windows.push(window.clone());
                    }
                }
                if let Some(entry) = guard.machine.cooldown_entry() {
                    let mut entry = entry.clone();
                    if entry.token_mint.is_empty() {
                        entry.token_mint = mint.clone();
                    }
                    snap.cooldowns.push(entry);
                }
            }
        }

        snap.alerts = self.alerts.read().await.clone();
        snap.pending_checks = self.scheduler.pending_checks().await;
        snap
    }

    /// Persist the current state to the data directory.
    pub async fn persist(&self) -> Result<(), StateError> {
        let snapshot = self.snapshot(unix_now()).await;
        snapshot.save(&self.state_path())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The alert archive, oldest first.
    pub async fn alerts(&self) -> Vec<AlertRecord> {
        self.alerts.read().await.clone()
    }

    /// All wallet scores.
    pub async fn wallet_scores(&self) -> Vec<WalletScore> {
        self.scores.read().await.scores()
    }

    /// A wallet's current trust status.
    pub async fn wallet_status(&self, wallet: &str) -> TrustStatus {
        self.scores.read().await.status(wallet)
    }

    /// Number of tokens with live per-token state.
    pub async fn tracked_tokens(&self) -> usize {
        self.slots.read().await.len()
    }

    async fn slot(&self, mint: &str) -> Arc<Mutex<TokenSlot>> {
        {
            let slots = self.slots.read().await;
            if let Some(slot) = slots.get(mint) {
                return slot.clone();
            }
        }
        let mut slots = self.slots.write().await;
        slots
            .entry(mint.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(TokenSlot::new(self.config.policy))))
            .clone()
    }
}

enum Revalidation {
    Passed(TokenStats),
    Failed,
    Unavailable,
}
