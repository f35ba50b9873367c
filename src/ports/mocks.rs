//! Hand-rolled port mocks for tests: recording, scripted responses,
//! deterministic. Shared by unit tests and the integration suite.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::{AlertRecord, BuyEvent, TokenStats};

use super::alert_sink::{AlertSinkError, AlertSinkPort};
use super::event_source::{EventSourceError, EventSourcePort};
use super::token_data::{TokenDataError, TokenDataPort};

/// Mock token data port with sticky per-mint stats plus an optional
/// scripted response queue (consumed first) for failure sequences.
#[derive(Debug, Default)]
pub struct MockTokenData {
    sticky: Arc<Mutex<HashMap<String, TokenStats>>>,
    scripted: Arc<Mutex<HashMap<String, VecDeque<Result<TokenStats, TokenDataError>>>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockTokenData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: every lookup for `mint` returns `stats`
    pub fn with_stats(self, mint: &str, stats: TokenStats) -> Self {
        self.sticky.lock().unwrap().insert(mint.to_string(), stats);
        self
    }

    /// Queue a one-shot response ahead of the sticky value
    pub fn push_response(&self, mint: &str, response: Result<TokenStats, TokenDataError>) {
        self.scripted
            .lock()
            .unwrap()
            .entry(mint.to_string())
            .or_default()
            .push_back(response);
    }

    /// Replace the sticky stats for a mint
    pub fn set_stats(&self, mint: &str, stats: TokenStats) {
        self.sticky.lock().unwrap().insert(mint.to_string(), stats);
    }

    /// Drop the sticky stats so lookups fail
    pub fn clear_stats(&self, mint: &str) {
        self.sticky.lock().unwrap().remove(mint);
    }

    /// All mints queried, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TokenDataPort for MockTokenData {
    async fn token_stats(&self, mint: &str) -> Result<TokenStats, TokenDataError> {
        self.calls.lock().unwrap().push(mint.to_string());

        if let Some(queue) = self.scripted.lock().unwrap().get_mut(mint) {
            if let Some(response) = queue.pop_front() {
                return response;
            }
        }

        self.sticky
            .lock()
            .unwrap()
            .get(mint)
            .copied()
            .ok_or_else(|| TokenDataError::NoData(mint.to_string()))
    }
}

/// Mock alert sink recording every delivered alert
#[derive(Debug, Default)]
pub struct MockAlertSink {
    delivered: Arc<Mutex<Vec<(AlertRecord, Vec<BuyEvent>)>>>,
    fail: Arc<Mutex<bool>>,
}

impl MockAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent deliveries fail
    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    /// Alerts delivered so far
    pub fn delivered(&self) -> Vec<AlertRecord> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .map(|(a, _)| a.clone())
            .collect()
    }

    /// Events attached to the nth delivery
    pub fn delivered_events(&self, index: usize) -> Vec<BuyEvent> {
        self.delivered
            .lock()
            .unwrap()
            .get(index)
            .map(|(_, e)| e.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AlertSinkPort for MockAlertSink {
    async fn deliver(
        &self,
        alert: &AlertRecord,
        events: &[BuyEvent],
    ) -> Result<(), AlertSinkError> {
        if *self.fail.lock().unwrap() {
            return Err(AlertSinkError::DeliveryError("mock failure".to_string()));
        }
        self.delivered
            .lock()
            .unwrap()
            .push((alert.clone(), events.to_vec()));
        Ok(())
    }
}

/// Event source that replays a fixed batch and closes the channel
#[derive(Debug, Default)]
pub struct MockEventSource {
    events: Mutex<Vec<BuyEvent>>,
}

impl MockEventSource {
    pub fn new(events: Vec<BuyEvent>) -> Self {
        Self {
            events: Mutex::new(events),
        }
    }
}

#[async_trait]
impl EventSourcePort for MockEventSource {
    async fn subscribe(&self) -> Result<mpsc::Receiver<BuyEvent>, EventSourceError> {
        let events: Vec<BuyEvent> = self.events.lock().unwrap().drain(..).collect();
        let (tx, rx) = mpsc::channel(events.len().max(1));
        tokio::spawn(async move {
            for event in events {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats() -> TokenStats {
        TokenStats {
            liquidity_usd: 20_000.0,
            volume_24h_usd: 50_000.0,
            trade_count_24h: 100,
            market_cap_usd: 150_000.0,
        }
    }

    #[tokio::test]
    async fn test_mock_token_data_sticky() {
        let mock = MockTokenData::new().with_stats("M1", stats());
        let result = mock.token_stats("M1").await.unwrap();
        assert_eq!(result.trade_count_24h, 100);
        assert_eq!(mock.calls(), vec!["M1".to_string()]);
    }

    #[tokio::test]
    async fn test_mock_token_data_scripted_takes_priority() {
        let mock = MockTokenData::new().with_stats("M1", stats());
        mock.push_response("M1", Err(TokenDataError::RateLimited));

        assert!(mock.token_stats("M1").await.is_err());
        // Queue drained, sticky value takes over
        assert!(mock.token_stats("M1").await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_token_data_unknown_mint_errors() {
        let mock = MockTokenData::new();
        assert!(matches!(
            mock.token_stats("M9").await,
            Err(TokenDataError::NoData(_))
        ));
    }

    #[tokio::test]
    async fn test_mock_alert_sink_records() {
        let sink = MockAlertSink::new();
        let alert = AlertRecord {
            id: 1,
            token_mint: "M1".to_string(),
            token_symbol: None,
            wallets_involved: vec!["W1".to_string()],
            alert_market_cap: 100_000.0,
            trigger_timestamp: 1000,
            status: crate::domain::AlertStatus::PendingEval,
            classification: None,
            is_bullish: false,
            alert_count: 1,
            first_alert_mcap: None,
        };
        sink.deliver(&alert, &[]).await.unwrap();
        assert_eq!(sink.delivered().len(), 1);
        assert_eq!(sink.delivered()[0].token_mint, "M1");
    }

    #[tokio::test]
    async fn test_mock_event_source_replays_and_closes() {
        let event = BuyEvent {
            wallet: "W1".to_string(),
            token_mint: "M1".to_string(),
            token_symbol: None,
            tx_signature: "s1".to_string(),
            amount_usd: 10.0,
            market_cap_at_buy: 50_000.0,
            timestamp: 1000,
            program_ids: vec![],
        };
        let source = MockEventSource::new(vec![event]);
        let mut rx = source.subscribe().await.unwrap();
        assert_eq!(rx.recv().await.unwrap().tx_signature, "s1");
        assert!(rx.recv().await.is_none());
    }
}
