//! Alert Decision State Machine
//!
//! Governs when a threshold-crossing wallet cluster becomes an emitted
//! alert: cooldown suppression, soft-blackout threshold escalation after
//! fake alerts, and the one-shot bullish re-alert upgrade.
//!
//! All methods take explicit unix-second timestamps so the machine is
//! deterministic under test; the async engine supplies wall-clock time.

use serde::{Deserialize, Serialize};

use super::outcome::OutcomeClass;

/// Default distinct-wallet threshold for an alert
pub const DEFAULT_BASE_THRESHOLD: u32 = 3;

/// Default threshold increase while a token is under soft blackout
pub const DEFAULT_BLACKOUT_EXTRA_THRESHOLD: u32 = 1;

/// Default per-token cooldown after a confirmed alert (seconds)
pub const DEFAULT_COOLDOWN_SECS: u64 = 300;

/// Default window for a bullish re-alert after the first alert (seconds)
pub const DEFAULT_BULLISH_WINDOW_SECS: u64 = 1800;

/// Default duration of a fake-alert threshold escalation (seconds)
pub const DEFAULT_ESCALATION_SECS: u64 = 3600;

/// Post-evaluation status of an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    /// Emitted, outcome checks still pending
    PendingEval,
    /// Outcome showed real upside
    Confirmed,
    /// Outcome showed the alert should not have fired
    Fake,
    /// Price source unavailable through evaluation
    Unknown,
}

/// An emitted alert. Created by the state machine, status mutated only
/// by the outcome evaluator, archived forever.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: u64,
    pub token_mint: String,
    pub token_symbol: Option<String>,
    /// Distinct wallets that formed the cluster, in arrival order
    pub wallets_involved: Vec<String>,
    /// Market cap at trigger time (baseline for outcome checks)
    pub alert_market_cap: f64,
    pub trigger_timestamp: u64,
    pub status: AlertStatus,
    /// Final classification once evaluated
    pub classification: Option<OutcomeClass>,
    /// Whether this is a bullish re-alert
    pub is_bullish: bool,
    /// 1 for a first alert, incremented for follow-ups in the chain
    pub alert_count: u32,
    /// Market cap of the first alert in the chain (bullish re-alerts)
    pub first_alert_mcap: Option<f64>,
}

impl AlertRecord {
    /// Apply the evaluated outcome. Status follows the classification;
    /// `Unknown` is recorded explicitly rather than dropped.
    pub fn apply_outcome(&mut self, class: OutcomeClass) {
        self.classification = Some(class);
        self.status = match class {
            OutcomeClass::Trash => AlertStatus::Fake,
            OutcomeClass::ShortList | OutcomeClass::ContractsCheck => AlertStatus::Confirmed,
            OutcomeClass::Unknown => AlertStatus::Unknown,
        };
    }
}

/// Per-token suppression and escalation state. Created on the first
/// alert (or fake alert) for a token; pruned once cooldown, escalation,
/// and the bullish window have all lapsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CooldownEntry {
    pub token_mint: String,
    /// Timestamp of the last confirmed alert, if any
    pub last_alert_timestamp: Option<u64>,
    /// Market cap of the first alert in the current chain
    pub first_alert_mcap: f64,
    /// Confirmed alerts in the current chain
    pub alert_count: u32,
    /// Whether the one permitted bullish re-alert was already emitted
    pub bullish_used: bool,
    /// Timestamp of the fake alert that raised the threshold, if active
    pub threshold_override: Option<u64>,
}

impl CooldownEntry {
    fn new(token_mint: String) -> Self {
        Self {
            token_mint,
            last_alert_timestamp: None,
            first_alert_mcap: 0.0,
            alert_count: 0,
            bullish_used: false,
            threshold_override: None,
        }
    }
}

/// Phase of the per-token decision machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertPhase {
    Idle,
    Collecting,
    ThresholdReached,
    Revalidating,
    Cooldown,
}

/// Threshold and timing policy (configuration values)
#[derive(Debug, Clone, Copy)]
pub struct AlertPolicy {
    /// Distinct wallets required for an alert
    pub base_threshold: u32,
    /// Extra wallets required while a fake-alert escalation is active
    pub blackout_extra_threshold: u32,
    /// Unconditional threshold increase applied to every token
    pub global_threshold_boost: u32,
    pub cooldown_secs: u64,
    pub bullish_window_secs: u64,
    /// How long a fake-alert escalation lasts without a confirmed alert
    pub escalation_secs: u64,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            base_threshold: DEFAULT_BASE_THRESHOLD,
            blackout_extra_threshold: DEFAULT_BLACKOUT_EXTRA_THRESHOLD,
            global_threshold_boost: 0,
            cooldown_secs: DEFAULT_COOLDOWN_SECS,
            bullish_window_secs: DEFAULT_BULLISH_WINDOW_SECS,
            escalation_secs: DEFAULT_ESCALATION_SECS,
        }
    }
}

/// Outcome of a confirmed threshold crossing
#[derive(Debug, Clone, PartialEq)]
pub struct AlertTicket {
    pub is_bullish: bool,
    pub alert_count: u32,
    /// Market cap of the first alert in the chain, for bullish re-alerts
    pub first_alert_mcap: Option<f64>,
}

/// Per-token alert decision machine.
///
/// Drives `Idle -> Collecting -> ThresholdReached -> Revalidating ->
/// {confirmed | suppressed} -> Cooldown -> Idle`. Terminal states are
/// not retained; the machine settles back to `Idle` lazily.
#[derive(Debug, Clone)]
pub struct AlertMachine {
    policy: AlertPolicy,
    phase: AlertPhase,
    cooldown: Option<CooldownEntry>,
}

impl AlertMachine {
    pub fn new(policy: AlertPolicy) -> Self {
        Self {
            policy,
            phase: AlertPhase::Idle,
            cooldown: None,
        }
    }

    /// Rebuild from a persisted cooldown entry (restart path).
    pub fn with_cooldown(policy: AlertPolicy, entry: CooldownEntry) -> Self {
        Self {
            policy,
            phase: AlertPhase::Idle,
            cooldown: Some(entry),
        }
    }

    pub fn phase(&self) -> AlertPhase {
        self.phase
    }

    pub fn cooldown_entry(&self) -> Option<&CooldownEntry> {
        self.cooldown.as_ref()
    }

    /// Whether the token is inside its post-alert cooldown at `now`.
    pub fn in_cooldown(&self, now: u64) -> bool {
        self.cooldown
            .as_ref()
            .and_then(|c| c.last_alert_timestamp)
            .map(|t| now.saturating_sub(t) < self.policy.cooldown_secs)
            .unwrap_or(false)
    }

    /// Whether a new window may begin for this token at `now`.
    pub fn may_open_window(&self, now: u64) -> bool {
        !self.in_cooldown(now)
            && matches!(self.phase, AlertPhase::Idle | AlertPhase::Cooldown)
    }

    /// The distinct-wallet threshold in force at `now`. An expired
    /// fake-alert escalation is cleared as a side effect.
    pub fn effective_threshold(&mut self, now: u64) -> u32 {
        let mut threshold = self.policy.base_threshold + self.policy.global_threshold_boost;

        if let Some(entry) = self.cooldown.as_mut() {
            if let Some(raised_at) = entry.threshold_override {
                if now.saturating_sub(raised_at) < self.policy.escalation_secs {
                    threshold += self.policy.blackout_extra_threshold;
                } else {
                    tracing::info!(
                        "Threshold escalation expired for {}, back to {}",
                        entry.token_mint,
                        threshold
                    );
                    entry.threshold_override = None;
                }
            }
        }

        threshold
    }

    /// A window just opened for this token.
    pub fn on_window_opened(&mut self) {
        self.phase = AlertPhase::Collecting;
    }

    /// The window crossed the effective threshold; revalidation starts.
    pub fn on_threshold_reached(&mut self, token: &str, distinct: usize) {
        self.phase = AlertPhase::ThresholdReached;
        tracing::info!("Threshold reached for {}: {} wallet(s)", token, distinct);
        self.phase = AlertPhase::Revalidating;
    }

    /// Revalidation passed: the alert is confirmed. Returns the ticket
    /// describing whether this is a first alert or a bullish re-alert,
    /// and enters cooldown. A confirmed alert also clears any active
    /// fake-alert escalation (reversibility).
    pub fn on_revalidation_passed(&mut self, now: u64, alert_mcap: f64) -> AlertTicket {
        let entry = self
            .cooldown
            .get_or_insert_with(|| CooldownEntry::new(String::new()));

        let chain_alive = entry
            .last_alert_timestamp
            .map(|t| now.saturating_sub(t) <= self.policy.bullish_window_secs)
            .unwrap_or(false);

        let ticket = if chain_alive {
            let is_bullish = !entry.bullish_used;
            if is_bullish {
                entry.bullish_used = true;
            }
            entry.alert_count += 1;
            AlertTicket {
                is_bullish,
                alert_count: entry.alert_count,
                first_alert_mcap: Some(entry.first_alert_mcap),
            }
        } else {
            // Fresh chain
            entry.alert_count = 1;
            entry.bullish_used = false;
            entry.first_alert_mcap = alert_mcap;
            AlertTicket {
                is_bullish: false,
                alert_count: 1,
                first_alert_mcap: None,
            }
        };

        entry.last_alert_timestamp = Some(now);
        entry.threshold_override = None;
        self.phase = AlertPhase::Cooldown;

        ticket
    }

    /// Revalidation failed: suppress and escalate the threshold.
    pub fn on_revalidation_failed(&mut self, now: u64, token: &str) {
        let entry = self
            .cooldown
            .get_or_insert_with(|| CooldownEntry::new(token.to_string()));
        if entry.token_mint.is_empty() {
            entry.token_mint = token.to_string();
        }
        entry.threshold_override = Some(now);
        self.phase = AlertPhase::Idle;
        tracing::warn!(
            "Fake alert suppressed for {}, threshold escalated for {}s",
            token,
            self.policy.escalation_secs
        );
    }

    /// Revalidation could not run (price source unavailable through all
    /// retries): suppress without judging anyone. No escalation, no
    /// fake-alert signal - there was no data to judge with.
    pub fn on_revalidation_aborted(&mut self, token: &str) {
        self.phase = AlertPhase::Idle;
        tracing::warn!(
            "Revalidation aborted for {} (stats unavailable), cluster discarded",
            token
        );
    }

    /// The window expired below threshold; settle back to idle.
    pub fn on_window_expired(&mut self) {
        if self.phase == AlertPhase::Collecting {
            self.phase = AlertPhase::Idle;
        }
    }

    /// Bind the cooldown entry to its token (entries created through
    /// `on_revalidation_passed` start unnamed).
    pub fn bind_token(&mut self, token: &str) {
        if let Some(entry) = self.cooldown.as_mut() {
            if entry.token_mint.is_empty() {
                entry.token_mint = token.to_string();
            }
        }
    }

    /// Lazy cleanup: once cooldown, escalation, and the bullish window
    /// have all lapsed, the machine is indistinguishable from a fresh
    /// one and reports itself prunable.
    pub fn tick(&mut self, now: u64) -> bool {
        if self.in_cooldown(now) {
            return false;
        }
        if matches!(self.phase, AlertPhase::Cooldown) {
            self.phase = AlertPhase::Idle;
        }

        let Some(entry) = self.cooldown.as_ref() else {
            return matches!(self.phase, AlertPhase::Idle);
        };

        let escalation_active = entry
            .threshold_override
            .map(|t| now.saturating_sub(t) < self.policy.escalation_secs)
            .unwrap_or(false);
        let chain_alive = entry
            .last_alert_timestamp
            .map(|t| now.saturating_sub(t) <= self.policy.bullish_window_secs)
            .unwrap_or(false);

        if !escalation_active && !chain_alive && matches!(self.phase, AlertPhase::Idle) {
            self.cooldown = None;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> AlertMachine {
        AlertMachine::new(AlertPolicy::default())
    }

    #[test]
    fn test_default_threshold() {
        let mut m = machine();
        assert_eq!(m.effective_threshold(0), 3);
    }

    #[test]
    fn test_global_boost_raises_threshold() {
        let mut m = AlertMachine::new(AlertPolicy {
            global_threshold_boost: 1,
            ..AlertPolicy::default()
        });
        assert_eq!(m.effective_threshold(0), 4);
    }

    #[test]
    fn test_fake_alert_escalates_threshold() {
        let mut m = machine();
        m.on_revalidation_failed(1000, "T");
        assert_eq!(m.effective_threshold(1001), 4);
    }

    #[test]
    fn test_escalation_expires() {
        let mut m = machine();
        m.on_revalidation_failed(1000, "T");
        assert_eq!(m.effective_threshold(1000 + 3599), 4);
        assert_eq!(m.effective_threshold(1000 + 3600), 3);
        // Cleared, not just masked
        assert!(m.cooldown_entry().unwrap().threshold_override.is_none());
    }

    #[test]
    fn test_confirmed_alert_clears_escalation() {
        let mut m = machine();
        m.on_revalidation_failed(1000, "T");
        assert_eq!(m.effective_threshold(1100), 4);

        m.on_threshold_reached("T", 4);
        m.on_revalidation_passed(1200, 300_000.0);
        assert_eq!(m.effective_threshold(1201), 3);
    }

    #[test]
    fn test_cooldown_suppresses_new_windows() {
        let mut m = machine();
        m.on_window_opened();
        m.on_threshold_reached("T", 3);
        m.on_revalidation_passed(1000, 250_000.0);

        assert!(m.in_cooldown(1000 + 200));
        assert!(!m.may_open_window(1000 + 200));
        // Cooldown over after 300s
        assert!(!m.in_cooldown(1000 + 300));
        assert!(m.may_open_window(1000 + 300));
    }

    #[test]
    fn test_first_alert_ticket() {
        let mut m = machine();
        m.on_window_opened();
        m.on_threshold_reached("T", 3);
        let ticket = m.on_revalidation_passed(1000, 250_000.0);
        assert!(!ticket.is_bullish);
        assert_eq!(ticket.alert_count, 1);
        assert!(ticket.first_alert_mcap.is_none());
    }

    #[test]
    fn test_bullish_realert_between_cooldown_and_bullish_window() {
        let mut m = machine();
        m.on_window_opened();
        m.on_threshold_reached("T", 3);
        m.on_revalidation_passed(1000, 250_000.0);

        // Second independent cluster confirmed 10 minutes later
        assert!(m.may_open_window(1000 + 600));
        m.on_window_opened();
        m.on_threshold_reached("T", 3);
        let ticket = m.on_revalidation_passed(1000 + 600, 400_000.0);
        assert!(ticket.is_bullish);
        assert_eq!(ticket.alert_count, 2);
        assert_eq!(ticket.first_alert_mcap, Some(250_000.0));
    }

    #[test]
    fn test_bullish_permitted_only_once() {
        let mut m = machine();
        m.on_revalidation_passed(1000, 250_000.0);
        let second = m.on_revalidation_passed(1000 + 600, 400_000.0);
        assert!(second.is_bullish);

        // Third cluster still inside the chain window: not bullish again
        let third = m.on_revalidation_passed(1000 + 1200, 500_000.0);
        assert!(!third.is_bullish);
        assert_eq!(third.alert_count, 3);
    }

    #[test]
    fn test_chain_resets_after_bullish_window() {
        let mut m = machine();
        m.on_revalidation_passed(1000, 250_000.0);

        // Past the 30 minute chain window: fresh first alert
        let ticket = m.on_revalidation_passed(1000 + 1801, 100_000.0);
        assert!(!ticket.is_bullish);
        assert_eq!(ticket.alert_count, 1);
        assert_eq!(m.cooldown_entry().unwrap().first_alert_mcap, 100_000.0);
    }

    #[test]
    fn test_tick_prunes_settled_machine() {
        let mut m = machine();
        m.on_window_opened();
        m.on_threshold_reached("T", 3);
        m.on_revalidation_passed(1000, 250_000.0);

        // Inside cooldown / chain window: not prunable
        assert!(!m.tick(1000 + 100));
        assert!(!m.tick(1000 + 600));
        // After the bullish window lapses, prunable
        assert!(m.tick(1000 + 1801));
        assert!(m.cooldown_entry().is_none());
        assert_eq!(m.phase(), AlertPhase::Idle);
    }

    #[test]
    fn test_apply_outcome_maps_status() {
        let mut record = AlertRecord {
            id: 1,
            token_mint: "T".to_string(),
            token_symbol: None,
            wallets_involved: vec!["W1".to_string()],
            alert_market_cap: 100_000.0,
            trigger_timestamp: 1000,
            status: AlertStatus::PendingEval,
            classification: None,
            is_bullish: false,
            alert_count: 1,
            first_alert_mcap: None,
        };

        record.apply_outcome(OutcomeClass::ShortList);
        assert_eq!(record.status, AlertStatus::Confirmed);

        record.apply_outcome(OutcomeClass::Trash);
        assert_eq!(record.status, AlertStatus::Fake);

        record.apply_outcome(OutcomeClass::Unknown);
        assert_eq!(record.status, AlertStatus::Unknown);
    }
}
