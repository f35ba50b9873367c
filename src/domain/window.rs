//! Token Correlation Window
//!
//! One window per token, anchored at the first accepted buy. Distinct
//! wallets accumulate for a fixed lifetime; a wallet is counted at most
//! once per window no matter how many times it buys.

use serde::{Deserialize, Serialize};

use super::event::BuyEvent;

/// Default window lifetime in seconds
pub const DEFAULT_WINDOW_SECS: u64 = 20;

/// Lifecycle state of a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowState {
    /// Accumulating distinct wallets
    Collecting,
    /// Threshold reached, handed to the alert state machine
    Alerted,
    /// Lifetime elapsed below threshold - about to be evicted
    Expired,
}

/// An accepted buy inside a window, with the wallet's cluster weight
/// at accept time (1.0 for active wallets, a configured fraction for
/// soft-blackout wallets).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowEntry {
    pub event: BuyEvent,
    pub weight: f64,
}

/// Per-token sliding window aggregate. Owned exclusively by the
/// correlation tracker; all mutation happens under the token's lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenWindow {
    pub token_mint: String,
    /// Timestamp of the first accepted buy
    pub window_start: u64,
    /// Accepted buys in arrival order, one per wallet
    pub entries: Vec<WindowEntry>,
    pub state: WindowState,
}

impl TokenWindow {
    /// Open a window seeded with its first accepted buy.
    pub fn open(event: BuyEvent, weight: f64) -> Self {
        let window_start = event.timestamp;
        let token_mint = event.token_mint.clone();
        tracing::debug!(
            "Window opened for {} at t={}",
            event.display_symbol(),
            window_start
        );
        Self {
            token_mint,
            window_start,
            entries: vec![WindowEntry { event, weight }],
            state: WindowState::Collecting,
        }
    }

    /// Whether a wallet is already represented in this window.
    pub fn contains_wallet(&self, wallet: &str) -> bool {
        self.entries.iter().any(|e| e.event.wallet == wallet)
    }

    /// Append an accepted buy. Duplicate wallets are ignored
    /// (idempotent - the caller's filter should have caught them, this
    /// is the invariant's last line of defense).
    pub fn add(&mut self, event: BuyEvent, weight: f64) {
        if self.state != WindowState::Collecting {
            return;
        }
        if self.contains_wallet(&event.wallet) {
            return;
        }
        self.entries.push(WindowEntry { event, weight });
    }

    /// Number of distinct wallets in the window.
    pub fn distinct_wallets(&self) -> usize {
        self.entries.len()
    }

    /// Trust-weighted cluster size.
    pub fn weighted_count(&self) -> f64 {
        self.entries.iter().map(|e| e.weight).sum()
    }

    /// Wallet addresses in arrival order.
    pub fn wallets(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.event.wallet.clone()).collect()
    }

    /// The underlying events, for the alert sink.
    pub fn events(&self) -> Vec<BuyEvent> {
        self.entries.iter().map(|e| e.event.clone()).collect()
    }

    /// Whether the window's lifetime has elapsed while still collecting.
    pub fn is_expired(&self, now: u64, window_secs: u64) -> bool {
        self.state == WindowState::Collecting
            && now.saturating_sub(self.window_start) > window_secs
    }

    /// Whether the window still accepts events at `now`.
    pub fn is_open(&self, now: u64, window_secs: u64) -> bool {
        self.state == WindowState::Collecting && !self.is_expired(now, window_secs)
    }

    pub fn mark_alerted(&mut self) {
        self.state = WindowState::Alerted;
    }

    pub fn mark_expired(&mut self) {
        self.state = WindowState::Expired;
        tracing::debug!(
            "Window expired for {} with {} wallet(s)",
            self.token_mint,
            self.distinct_wallets()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn event(wallet: &str, timestamp: u64) -> BuyEvent {
        BuyEvent {
            wallet: wallet.to_string(),
            token_mint: "MintTTTTTTTTTTTTTTTTTTTTTTTTTTTTTTTTTTTTTTT".to_string(),
            token_symbol: Some("TT".to_string()),
            tx_signature: format!("sig-{}-{}", wallet, timestamp),
            amount_usd: 100.0,
            market_cap_at_buy: 200_000.0,
            timestamp,
            program_ids: vec![],
        }
    }

    #[test]
    fn test_open_anchors_at_first_buy() {
        let window = TokenWindow::open(event("W1", 1000), 1.0);
        assert_eq!(window.window_start, 1000);
        assert_eq!(window.state, WindowState::Collecting);
        assert_eq!(window.distinct_wallets(), 1);
    }

    #[test]
    fn test_duplicate_wallet_is_idempotent() {
        let mut window = TokenWindow::open(event("W1", 1000), 1.0);
        window.add(event("W1", 1005), 1.0);
        window.add(event("W1", 1010), 1.0);
        assert_eq!(window.distinct_wallets(), 1);
    }

    #[test]
    fn test_distinct_wallets_accumulate() {
        let mut window = TokenWindow::open(event("W1", 1000), 1.0);
        window.add(event("W2", 1008), 1.0);
        window.add(event("W3", 1015), 1.0);
        assert_eq!(window.distinct_wallets(), 3);
        assert_eq!(window.wallets(), vec!["W1", "W2", "W3"]);
    }

    #[test]
    fn test_weighted_count_with_soft_blackout() {
        let mut window = TokenWindow::open(event("W1", 1000), 1.0);
        window.add(event("W2", 1005), 0.5);
        window.add(event("W3", 1010), 1.0);
        assert_relative_eq!(window.weighted_count(), 2.5);
        assert_eq!(window.distinct_wallets(), 3);
    }

    #[test]
    fn test_expiry_boundary() {
        let window = TokenWindow::open(event("W1", 1000), 1.0);
        // Exactly at the lifetime boundary the window is still open
        assert!(!window.is_expired(1020, DEFAULT_WINDOW_SECS));
        assert!(window.is_open(1020, DEFAULT_WINDOW_SECS));
        // One second past, it is not
        assert!(window.is_expired(1021, DEFAULT_WINDOW_SECS));
        assert!(!window.is_open(1021, DEFAULT_WINDOW_SECS));
    }

    #[test]
    fn test_closed_window_drops_events() {
        let mut window = TokenWindow::open(event("W1", 1000), 1.0);
        window.mark_alerted();
        window.add(event("W2", 1005), 1.0);
        assert_eq!(window.distinct_wallets(), 1);
    }

    #[test]
    fn test_expired_window_is_not_expired_twice() {
        let mut window = TokenWindow::open(event("W1", 1000), 1.0);
        window.mark_expired();
        assert_eq!(window.state, WindowState::Expired);
        // is_expired only applies to collecting windows
        assert!(!window.is_expired(2000, DEFAULT_WINDOW_SECS));
    }

    #[test]
    fn test_window_round_trips_through_json() {
        let mut window = TokenWindow::open(event("W1", 1000), 1.0);
        window.add(event("W2", 1010), 0.5);

        let json = serde_json::to_string(&window).unwrap();
        let back: TokenWindow = serde_json::from_str(&json).unwrap();
        assert_eq!(back.distinct_wallets(), 2);
        assert_eq!(back.window_start, 1000);
        assert_eq!(back.state, WindowState::Collecting);
    }
}
