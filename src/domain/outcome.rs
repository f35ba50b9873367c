//! Alert Outcome Evaluation
//!
//! After an alert fires, the token's market cap is sampled at fixed
//! offsets and the alert is classified by how the cap moved relative to
//! the cap at alert time. The classification becomes one outcome sample
//! for every wallet that contributed to the alert.
//!
//! Checkpoints:
//! - +1min: ATH tracking only
//! - +5min: short-list check (moderate upside)
//! - +15min: ATH tracking only
//! - +30min: final check (strong upside) and classification

use serde::{Deserialize, Serialize};

/// Default market cap change for the short-list classification (+20%)
pub const DEFAULT_SHORT_LIST_THRESHOLD: f64 = 0.20;

/// Default market cap change for the contracts-check classification (+50%)
pub const DEFAULT_CONTRACTS_CHECK_THRESHOLD: f64 = 0.50;

/// Default ceiling under which a change counts as no meaningful upside (+5%)
pub const DEFAULT_TRASH_CEILING: f64 = 0.05;

/// Default market cap floor below which a token is considered dead
pub const DEFAULT_DEAD_TOKEN_MCAP_USD: f64 = 20_000.0;

/// Default retry attempts per checkpoint when the price source fails
pub const DEFAULT_CHECK_RETRIES: u32 = 3;

/// What a checkpoint contributes to the evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckKind {
    /// Update the ATH market cap, nothing else
    AthOnly,
    /// Record the 5-minute change
    ShortList,
    /// Record the 30-minute change and classify
    Final,
}

/// A scheduled sampling point relative to the alert trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckPoint {
    /// Seconds after the alert trigger
    pub offset_secs: u64,
    pub kind: CheckKind,
}

/// The fixed checkpoint schedule
pub const CHECK_POINTS: &[CheckPoint] = &[
    CheckPoint { offset_secs: 60, kind: CheckKind::AthOnly },
    CheckPoint { offset_secs: 300, kind: CheckKind::ShortList },
    CheckPoint { offset_secs: 900, kind: CheckKind::AthOnly },
    CheckPoint { offset_secs: 1800, kind: CheckKind::Final },
];

/// Closed set of alert quality classifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeClass {
    /// No meaningful upside, or the token died
    Trash,
    /// Moderate sustained upside - worth shortlisting
    ShortList,
    /// Strong upside - warrants manual contract review
    ContractsCheck,
    /// Price source unavailable through all retries
    Unknown,
}

/// Classification thresholds (configuration values, not constants)
#[derive(Debug, Clone, Copy)]
pub struct OutcomeConfig {
    pub short_list_threshold: f64,
    pub contracts_check_threshold: f64,
    pub trash_ceiling: f64,
    pub dead_token_mcap_usd: f64,
    /// Retry attempts per checkpoint before giving up on it
    pub check_retries: u32,
}

impl Default for OutcomeConfig {
    fn default() -> Self {
        Self {
            short_list_threshold: DEFAULT_SHORT_LIST_THRESHOLD,
            contracts_check_threshold: DEFAULT_CONTRACTS_CHECK_THRESHOLD,
            trash_ceiling: DEFAULT_TRASH_CEILING,
            dead_token_mcap_usd: DEFAULT_DEAD_TOKEN_MCAP_USD,
            check_retries: DEFAULT_CHECK_RETRIES,
        }
    }
}

/// Scheduling metadata for an alert's pending checks.
///
/// This is the state the core exposes so a host can reconstruct timers
/// after a restart: trigger timestamp and alert market cap are enough
/// to rebuild every remaining checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingCheck {
    /// Alert this evaluation belongs to
    pub alert_id: u64,
    pub token_mint: String,
    pub token_symbol: Option<String>,
    /// Market cap at alert time (baseline for change percentages)
    pub alert_mcap: f64,
    /// Unix timestamp the alert fired
    pub trigger_timestamp: u64,
    /// Wallets to attribute the outcome to
    pub wallets: Vec<String>,
}

/// Accumulates checkpoint samples for one alert and classifies at the end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeEvaluation {
    /// Baseline market cap
    pub alert_mcap: f64,
    /// ATH market cap seen across checkpoints (starts at baseline)
    pub ath_mcap: f64,
    /// Market cap at +5min, if sampled
    pub mcap_5min: Option<f64>,
    /// Market cap at +30min, if sampled
    pub mcap_30min: Option<f64>,
    /// Checkpoints that failed through all retries
    pub missed_checks: u32,
}

impl OutcomeEvaluation {
    pub fn new(alert_mcap: f64) -> Self {
        Self {
            alert_mcap,
            ath_mcap: alert_mcap,
            mcap_5min: None,
            mcap_30min: None,
            missed_checks: 0,
        }
    }

    /// Record a sampled market cap at a checkpoint.
    pub fn record(&mut self, kind: CheckKind, mcap: f64) {
        if mcap > self.ath_mcap {
            self.ath_mcap = mcap;
        }
        match kind {
            CheckKind::ShortList => self.mcap_5min = Some(mcap),
            CheckKind::Final => self.mcap_30min = Some(mcap),
            CheckKind::AthOnly => {}
        }
    }

    /// Record a checkpoint whose fetch failed through all retries.
    pub fn record_missed(&mut self, kind: CheckKind) {
        self.missed_checks += 1;
        tracing::warn!("Outcome checkpoint {:?} missed after retries", kind);
    }

    /// Percent change at +5min relative to the alert baseline.
    pub fn change_5min(&self) -> Option<f64> {
        self.mcap_5min.map(|m| self.change_from_baseline(m))
    }

    /// Percent change at +30min relative to the alert baseline.
    pub fn change_30min(&self) -> Option<f64> {
        self.mcap_30min.map(|m| self.change_from_baseline(m))
    }

    fn change_from_baseline(&self, mcap: f64) -> f64 {
        if self.alert_mcap <= 0.0 {
            return 0.0;
        }
        (mcap - self.alert_mcap) / self.alert_mcap
    }

    /// Classify the alert from the accumulated samples.
    ///
    /// The 30-minute sample anchors the decision; without it the alert
    /// is `Unknown` unless the 5-minute sample alone already cleared the
    /// short-list bar. Changes that never clear the trash ceiling, or a
    /// token that fell under the dead floor, classify as `Trash`.
    pub fn classify(&self, config: &OutcomeConfig) -> OutcomeClass {
        let change_5m = self.change_5min();
        let change_30m = self.change_30min();

        match (change_5m, change_30m) {
            (None, None) => OutcomeClass::Unknown,
            (Some(c5), None) => {
                if c5 >= config.short_list_threshold {
                    OutcomeClass::ShortList
                } else {
                    OutcomeClass::Unknown
                }
            }
            (c5, Some(c30)) => {
                let mcap_30m = self.mcap_30min.unwrap_or(0.0);
                if mcap_30m <= config.dead_token_mcap_usd {
                    return OutcomeClass::Trash;
                }
                if c30 >= config.contracts_check_threshold {
                    return OutcomeClass::ContractsCheck;
                }
                let best = c5.map(|c| c.max(c30)).unwrap_or(c30);
                if best >= config.short_list_threshold {
                    return OutcomeClass::ShortList;
                }
                OutcomeClass::Trash
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn config() -> OutcomeConfig {
        OutcomeConfig::default()
    }

    #[test]
    fn test_checkpoint_schedule() {
        assert_eq!(CHECK_POINTS.len(), 4);
        assert_eq!(CHECK_POINTS[1].offset_secs, 300);
        assert_eq!(CHECK_POINTS[1].kind, CheckKind::ShortList);
        assert_eq!(CHECK_POINTS[3].offset_secs, 1800);
        assert_eq!(CHECK_POINTS[3].kind, CheckKind::Final);
    }

    #[test]
    fn test_ath_tracks_maximum() {
        let mut eval = OutcomeEvaluation::new(100_000.0);
        eval.record(CheckKind::AthOnly, 180_000.0);
        eval.record(CheckKind::ShortList, 150_000.0);
        eval.record(CheckKind::Final, 120_000.0);
        assert_relative_eq!(eval.ath_mcap, 180_000.0);
    }

    #[test]
    fn test_change_percentages() {
        let mut eval = OutcomeEvaluation::new(100_000.0);
        eval.record(CheckKind::ShortList, 125_000.0);
        eval.record(CheckKind::Final, 160_000.0);
        assert_relative_eq!(eval.change_5min().unwrap(), 0.25, epsilon = 1e-9);
        assert_relative_eq!(eval.change_30min().unwrap(), 0.60, epsilon = 1e-9);
    }

    #[test]
    fn test_classify_contracts_check() {
        let mut eval = OutcomeEvaluation::new(100_000.0);
        eval.record(CheckKind::ShortList, 110_000.0);
        eval.record(CheckKind::Final, 160_000.0);
        assert_eq!(eval.classify(&config()), OutcomeClass::ContractsCheck);
    }

    #[test]
    fn test_classify_short_list_on_sustained_upside() {
        let mut eval = OutcomeEvaluation::new(100_000.0);
        eval.record(CheckKind::ShortList, 125_000.0);
        eval.record(CheckKind::Final, 130_000.0);
        assert_eq!(eval.classify(&config()), OutcomeClass::ShortList);
    }

    #[test]
    fn test_classify_trash_when_flat() {
        let mut eval = OutcomeEvaluation::new(100_000.0);
        eval.record(CheckKind::ShortList, 102_000.0);
        eval.record(CheckKind::Final, 101_000.0);
        assert_eq!(eval.classify(&config()), OutcomeClass::Trash);
    }

    #[test]
    fn test_classify_trash_on_dead_token() {
        // +30min cap under the dead floor is trash even if the
        // percentages look fine from a tiny baseline
        let mut eval = OutcomeEvaluation::new(10_000.0);
        eval.record(CheckKind::ShortList, 18_000.0);
        eval.record(CheckKind::Final, 15_000.0);
        assert_eq!(eval.classify(&config()), OutcomeClass::Trash);
    }

    #[test]
    fn test_classify_unknown_when_nothing_sampled() {
        let mut eval = OutcomeEvaluation::new(100_000.0);
        eval.record_missed(CheckKind::ShortList);
        eval.record_missed(CheckKind::Final);
        assert_eq!(eval.classify(&config()), OutcomeClass::Unknown);
        assert_eq!(eval.missed_checks, 2);
    }

    #[test]
    fn test_classify_with_missing_5min_uses_30min() {
        let mut eval = OutcomeEvaluation::new(100_000.0);
        eval.record_missed(CheckKind::ShortList);
        eval.record(CheckKind::Final, 125_000.0);
        assert_eq!(eval.classify(&config()), OutcomeClass::ShortList);
    }

    #[test]
    fn test_classify_with_missing_30min_stays_unknown_unless_5min_cleared() {
        let mut eval = OutcomeEvaluation::new(100_000.0);
        eval.record(CheckKind::ShortList, 110_000.0);
        eval.record_missed(CheckKind::Final);
        assert_eq!(eval.classify(&config()), OutcomeClass::Unknown);

        let mut eval = OutcomeEvaluation::new(100_000.0);
        eval.record(CheckKind::ShortList, 130_000.0);
        eval.record_missed(CheckKind::Final);
        assert_eq!(eval.classify(&config()), OutcomeClass::ShortList);
    }

    #[test]
    fn test_zero_baseline_does_not_divide() {
        let mut eval = OutcomeEvaluation::new(0.0);
        eval.record(CheckKind::Final, 50_000.0);
        assert_relative_eq!(eval.change_30min().unwrap(), 0.0);
    }
}
