//! State Persistence
//!
//! JSON snapshot of everything the core needs back after a restart:
//! wallet scores, cooldown/escalation entries, open windows, the alert
//! archive, and the scheduling metadata for pending outcome checks.
//!
//! A snapshot that violates a core invariant is a fatal startup error,
//! never silently repaired.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::alert::{AlertRecord, CooldownEntry};
use super::outcome::PendingCheck;
use super::wallet_score::WalletScore;
use super::window::{TokenWindow, WindowState};

/// Default snapshot file name inside the data directory
pub const STATE_FILE: &str = "sentinel_state.json";

#[derive(Debug, Error)]
pub enum StateError {
    #[error("Failed to read state file: {0}")]
    ReadError(String),

    #[error("Failed to write state file: {0}")]
    WriteError(String),

    #[error("Failed to parse state file: {0}")]
    ParseError(String),

    #[error("Corrupt state: {0}")]
    Corrupt(String),
}

/// Full core state for crash recovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub wallet_scores: Vec<WalletScore>,
    pub cooldowns: Vec<CooldownEntry>,
    /// Windows still collecting at shutdown
    pub open_windows: Vec<TokenWindow>,
    /// Alert archive - never deleted, only appended
    pub alerts: Vec<AlertRecord>,
    /// Scheduling metadata to rebuild deferred outcome checks
    pub pending_checks: Vec<PendingCheck>,
    /// Unix timestamp the snapshot was taken
    pub saved_at: u64,
}

impl StateSnapshot {
    pub fn new(saved_at: u64) -> Self {
        Self {
            wallet_scores: Vec::new(),
            cooldowns: Vec::new(),
            open_windows: Vec::new(),
            alerts: Vec::new(),
            pending_checks: Vec::new(),
            saved_at,
        }
    }

    /// Load and validate a snapshot. Missing file is not an error -
    /// the core simply starts fresh.
    pub fn load(path: &Path) -> Result<Option<Self>, StateError> {
        if !path.exists() {
            return Ok(None);
        }
        let content =
            std::fs::read_to_string(path).map_err(|e| StateError::ReadError(e.to_string()))?;
        let snapshot: Self =
            serde_json::from_str(&content).map_err(|e| StateError::ParseError(e.to_string()))?;
        snapshot.validate()?;
        Ok(Some(snapshot))
    }

    /// Save the snapshot, creating the parent directory if needed.
    pub fn save(&self, path: &Path) -> Result<(), StateError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StateError::WriteError(e.to_string()))?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| StateError::WriteError(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| StateError::WriteError(e.to_string()))?;
        Ok(())
    }

    /// Check the core invariants a snapshot must satisfy.
    pub fn validate(&self) -> Result<(), StateError> {
        for score in &self.wallet_scores {
            if score.trash_count > score.total_count {
                return Err(StateError::Corrupt(format!(
                    "wallet {} has trash_count {} > total_count {}",
                    score.wallet, score.trash_count, score.total_count
                )));
            }
        }

        for window in &self.open_windows {
            if window.state != WindowState::Collecting {
                return Err(StateError::Corrupt(format!(
                    "persisted window for {} is not collecting",
                    window.token_mint
                )));
            }
            if window.entries.is_empty() {
                return Err(StateError::Corrupt(format!(
                    "persisted window for {} has no entries",
                    window.token_mint
                )));
            }
            let mut seen = std::collections::HashSet::new();
            for entry in &window.entries {
                if !seen.insert(entry.event.wallet.as_str()) {
                    return Err(StateError::Corrupt(format!(
                        "window for {} counts wallet {} twice",
                        window.token_mint, entry.event.wallet
                    )));
                }
            }
        }

        for entry in &self.cooldowns {
            if entry.last_alert_timestamp.is_some() && entry.alert_count == 0 {
                return Err(StateError::Corrupt(format!(
                    "cooldown for {} has an alert timestamp but zero alerts",
                    entry.token_mint
                )));
            }
        }

        for check in &self.pending_checks {
            if check.wallets.is_empty() {
                return Err(StateError::Corrupt(format!(
                    "pending check for alert {} has no wallets",
                    check.alert_id
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::BuyEvent;
    use crate::domain::wallet_score::TrustStatus;
    use tempfile::tempdir;

    fn event(wallet: &str) -> BuyEvent {
        BuyEvent {
            wallet: wallet.to_string(),
            token_mint: "M1".to_string(),
            token_symbol: None,
            tx_signature: format!("sig-{}", wallet),
            amount_usd: 50.0,
            market_cap_at_buy: 100_000.0,
            timestamp: 1000,
            program_ids: vec![],
        }
    }

    #[test]
    fn test_missing_file_starts_fresh() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(STATE_FILE);
        assert!(StateSnapshot::load(&path).unwrap().is_none());
    }

    #[test]
    fn test_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(STATE_FILE);

        let mut snapshot = StateSnapshot::new(5000);
        snapshot.wallet_scores.push(WalletScore {
            wallet: "W1".to_string(),
            trash_count: 2,
            total_count: 6,
            trust_status: TrustStatus::Active,
        });
        snapshot.open_windows.push(TokenWindow::open(event("W1"), 1.0));
        snapshot.save(&path).unwrap();

        let restored = StateSnapshot::load(&path).unwrap().unwrap();
        assert_eq!(restored.saved_at, 5000);
        assert_eq!(restored.wallet_scores.len(), 1);
        assert_eq!(restored.open_windows.len(), 1);
    }

    #[test]
    fn test_corrupt_score_is_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(STATE_FILE);

        let mut snapshot = StateSnapshot::new(5000);
        snapshot.wallet_scores.push(WalletScore {
            wallet: "W1".to_string(),
            trash_count: 7,
            total_count: 3,
            trust_status: TrustStatus::Active,
        });
        // Bypass validation by writing the raw JSON
        std::fs::write(&path, serde_json::to_string(&snapshot).unwrap()).unwrap();

        let result = StateSnapshot::load(&path);
        assert!(matches!(result, Err(StateError::Corrupt(_))));
    }

    #[test]
    fn test_duplicate_wallet_in_window_is_fatal() {
        let mut window = TokenWindow::open(event("W1"), 1.0);
        // Force the invariant violation past the add() guard
        window.entries.push(crate::domain::window::WindowEntry {
            event: event("W1"),
            weight: 1.0,
        });

        let mut snapshot = StateSnapshot::new(5000);
        snapshot.open_windows.push(window);
        assert!(matches!(snapshot.validate(), Err(StateError::Corrupt(_))));
    }

    #[test]
    fn test_unparseable_file_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(STATE_FILE);
        std::fs::write(&path, "not json at all").unwrap();
        assert!(matches!(
            StateSnapshot::load(&path),
            Err(StateError::ParseError(_))
        ));
    }

    #[test]
    fn test_pending_check_without_wallets_is_fatal() {
        let mut snapshot = StateSnapshot::new(5000);
        snapshot.pending_checks.push(crate::domain::outcome::PendingCheck {
            alert_id: 1,
            token_mint: "M1".to_string(),
            token_symbol: None,
            alert_mcap: 100_000.0,
            trigger_timestamp: 1000,
            wallets: vec![],
        });
        assert!(matches!(snapshot.validate(), Err(StateError::Corrupt(_))));
    }
}
