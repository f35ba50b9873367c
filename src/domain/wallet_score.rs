//! Wallet Scoring
//!
//! Per-wallet signal quality tracking. Every evaluated alert feeds one
//! outcome sample to each wallet that contributed to it; wallets whose
//! alerts keep going nowhere are first soft-blacklisted, then removed
//! outright. Removal is permanent.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::outcome::OutcomeClass;

/// Default trash ratio at which a wallet enters soft blackout
pub const DEFAULT_TRASH_WARN_THRESHOLD: f64 = 0.70;

/// Default trash ratio at which a wallet is removed for good
pub const DEFAULT_TRASH_REMOVE_THRESHOLD: f64 = 0.90;

/// Default minimum outcome samples before ratios are acted on
pub const DEFAULT_MIN_SAMPLES: u32 = 5;

/// Trust status of a tracked wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustStatus {
    /// Full participant in cluster counting
    Active,
    /// Degraded signal quality - contributes partial weight to clusters
    SoftBlackout,
    /// Permanently excluded from the pipeline
    Removed,
}

impl TrustStatus {
    /// Whether the wallet is still allowed through the filter pipeline
    pub fn is_tracked(&self) -> bool {
        !matches!(self, TrustStatus::Removed)
    }
}

/// Outcome history and trust status for a single wallet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletScore {
    /// Wallet address (base58)
    pub wallet: String,
    /// Outcomes classified as trash
    pub trash_count: u32,
    /// Total outcome samples
    pub total_count: u32,
    /// Current trust status
    pub trust_status: TrustStatus,
}

impl WalletScore {
    pub fn new(wallet: String) -> Self {
        Self {
            wallet,
            trash_count: 0,
            total_count: 0,
            trust_status: TrustStatus::Active,
        }
    }

    /// Trash ratio, or 0.0 while the sample is empty.
    pub fn trash_ratio(&self) -> f64 {
        if self.total_count == 0 {
            0.0
        } else {
            self.trash_count as f64 / self.total_count as f64
        }
    }
}

/// Scoring policy thresholds
#[derive(Debug, Clone, Copy)]
pub struct ScorerConfig {
    /// Trash ratio at which a wallet enters soft blackout
    pub trash_warn_threshold: f64,
    /// Trash ratio at which a wallet is permanently removed
    pub trash_remove_threshold: f64,
    /// Minimum samples before either threshold applies
    pub min_samples: u32,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            trash_warn_threshold: DEFAULT_TRASH_WARN_THRESHOLD,
            trash_remove_threshold: DEFAULT_TRASH_REMOVE_THRESHOLD,
            min_samples: DEFAULT_MIN_SAMPLES,
        }
    }
}

/// Wallet score book - the single writer for all `WalletScore` state.
///
/// The filter pipeline reads statuses through a shared lock; only the
/// scorer mutates them, so the hot path never contends with updates.
#[derive(Debug, Clone, Default)]
pub struct ScoreBook {
    config: ScorerConfig,
    scores: HashMap<String, WalletScore>,
}

impl ScoreBook {
    pub fn new(config: ScorerConfig) -> Self {
        Self {
            config,
            scores: HashMap::new(),
        }
    }

    /// Seed the book from persisted scores (restart path).
    pub fn from_scores(config: ScorerConfig, scores: Vec<WalletScore>) -> Self {
        let scores = scores.into_iter().map(|s| (s.wallet.clone(), s)).collect();
        Self { config, scores }
    }

    /// Record one evaluated outcome for a wallet and return its status
    /// after reclassification. `Unknown` outcomes count toward the
    /// sample total without counting as trash.
    pub fn record_outcome(&mut self, wallet: &str, class: OutcomeClass) -> TrustStatus {
        let score = self
            .scores
            .entry(wallet.to_string())
            .or_insert_with(|| WalletScore::new(wallet.to_string()));

        score.total_count += 1;
        if class == OutcomeClass::Trash {
            score.trash_count += 1;
        }

        Self::reclassify(score, &self.config)
    }

    /// Record a fake alert (failed revalidation) against a wallet.
    /// Counts as a trash sample - the wallet contributed to a cluster
    /// that should never have fired.
    pub fn record_fake_alert(&mut self, wallet: &str) -> TrustStatus {
        self.record_outcome(wallet, OutcomeClass::Trash)
    }

    /// Current trust status for a wallet. Unknown wallets are active.
    pub fn status(&self, wallet: &str) -> TrustStatus {
        self.scores
            .get(wallet)
            .map(|s| s.trust_status)
            .unwrap_or(TrustStatus::Active)
    }

    /// Score entry for a wallet, if any outcomes were recorded.
    pub fn score(&self, wallet: &str) -> Option<&WalletScore> {
        self.scores.get(wallet)
    }

    /// All scores, for persistence and reporting.
    pub fn scores(&self) -> Vec<WalletScore> {
        self.scores.values().cloned().collect()
    }

    /// Number of wallets with removed status.
    pub fn removed_count(&self) -> usize {
        self.scores
            .values()
            .filter(|s| s.trust_status == TrustStatus::Removed)
            .count()
    }

    fn reclassify(score: &mut WalletScore, config: &ScorerConfig) -> TrustStatus {
        // Removal is one-way; nothing a wallet does later can undo it.
        if score.trust_status == TrustStatus::Removed {
            return TrustStatus::Removed;
        }

        if score.total_count < config.min_samples {
            return score.trust_status;
        }

        let ratio = score.trash_ratio();
        let next = if ratio >= config.trash_remove_threshold {
            TrustStatus::Removed
        } else if ratio >= config.trash_warn_threshold {
            TrustStatus::SoftBlackout
        } else {
            TrustStatus::Active
        };

        if next != score.trust_status {
            tracing::info!(
                "Wallet {} reclassified {:?} -> {:?} (trash {}/{}, ratio {:.2})",
                score.wallet,
                score.trust_status,
                next,
                score.trash_count,
                score.total_count,
                ratio
            );
            score.trust_status = next;
        }

        score.trust_status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn book() -> ScoreBook {
        ScoreBook::new(ScorerConfig::default())
    }

    #[test]
    fn test_unknown_wallet_is_active() {
        let book = book();
        assert_eq!(book.status("W1"), TrustStatus::Active);
    }

    #[test]
    fn test_no_judgment_below_min_samples() {
        let mut book = book();
        // 4 trash outcomes: ratio 1.0 but below min sample size
        for _ in 0..4 {
            book.record_outcome("W1", OutcomeClass::Trash);
        }
        assert_eq!(book.status("W1"), TrustStatus::Active);
    }

    #[test]
    fn test_removal_at_threshold() {
        let mut book = book();
        for _ in 0..5 {
            book.record_outcome("W1", OutcomeClass::Trash);
        }
        assert_eq!(book.status("W1"), TrustStatus::Removed);
    }

    #[test]
    fn test_soft_blackout_band() {
        let mut book = book();
        // 4 trash + 1 good = 0.80: above warn, below remove
        for _ in 0..4 {
            book.record_outcome("W1", OutcomeClass::Trash);
        }
        let status = book.record_outcome("W1", OutcomeClass::ShortList);
        assert_eq!(status, TrustStatus::SoftBlackout);
    }

    #[test]
    fn test_soft_blackout_recovers() {
        let mut book = book();
        for _ in 0..4 {
            book.record_outcome("W1", OutcomeClass::Trash);
        }
        book.record_outcome("W1", OutcomeClass::ShortList);
        assert_eq!(book.status("W1"), TrustStatus::SoftBlackout);

        // Good outcomes dilute the ratio back under the warn threshold
        for _ in 0..2 {
            book.record_outcome("W1", OutcomeClass::ContractsCheck);
        }
        // 4 trash / 7 total = 0.57
        assert_eq!(book.status("W1"), TrustStatus::Active);
    }

    #[test]
    fn test_removal_is_monotonic() {
        let mut book = book();
        for _ in 0..5 {
            book.record_outcome("W1", OutcomeClass::Trash);
        }
        assert_eq!(book.status("W1"), TrustStatus::Removed);

        // A run of perfect outcomes must not resurrect the wallet
        for _ in 0..50 {
            book.record_outcome("W1", OutcomeClass::ContractsCheck);
        }
        assert_eq!(book.status("W1"), TrustStatus::Removed);
    }

    #[test]
    fn test_scenario_d_removal() {
        // totalCount=10, trashCount=9; next trash -> 10/11 = 0.909 >= 0.90
        let mut score = WalletScore::new("W".to_string());
        score.trash_count = 9;
        score.total_count = 10;
        let mut book = ScoreBook::from_scores(ScorerConfig::default(), vec![score]);

        let status = book.record_outcome("W", OutcomeClass::Trash);
        let score = book.score("W").unwrap();
        assert_eq!(score.trash_count, 10);
        assert_eq!(score.total_count, 11);
        assert_relative_eq!(score.trash_ratio(), 10.0 / 11.0, epsilon = 1e-9);
        assert_eq!(status, TrustStatus::Removed);
    }

    #[test]
    fn test_unknown_outcome_counts_total_only() {
        let mut book = book();
        book.record_outcome("W1", OutcomeClass::Unknown);
        let score = book.score("W1").unwrap();
        assert_eq!(score.total_count, 1);
        assert_eq!(score.trash_count, 0);
    }

    #[test]
    fn test_fake_alert_counts_as_trash() {
        let mut book = book();
        book.record_fake_alert("W1");
        let score = book.score("W1").unwrap();
        assert_eq!(score.trash_count, 1);
        assert_eq!(score.total_count, 1);
    }

    #[test]
    fn test_scores_round_trip() {
        let mut book = book();
        book.record_outcome("W1", OutcomeClass::Trash);
        book.record_outcome("W2", OutcomeClass::ShortList);

        let scores = book.scores();
        let restored = ScoreBook::from_scores(ScorerConfig::default(), scores);
        assert_eq!(restored.score("W1").unwrap().trash_count, 1);
        assert_eq!(restored.score("W2").unwrap().trash_count, 0);
    }
}
