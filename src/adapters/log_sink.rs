//! Tracing Alert Sink
//!
//! Default sink for the host binary: writes alerts to the structured
//! log. Real delivery channels (Telegram, webhooks) are wired in by the
//! host process behind the same port.

use async_trait::async_trait;
use chrono::DateTime;

use crate::domain::{AlertRecord, BuyEvent};
use crate::ports::alert_sink::{AlertSinkError, AlertSinkPort};

#[derive(Debug, Clone, Default)]
pub struct TracingAlertSink;

impl TracingAlertSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AlertSinkPort for TracingAlertSink {
    async fn deliver(
        &self,
        alert: &AlertRecord,
        events: &[BuyEvent],
    ) -> Result<(), AlertSinkError> {
        let kind = if alert.is_bullish { "BULLISH RE-ALERT" } else { "ALERT" };
        let when = DateTime::from_timestamp(alert.trigger_timestamp as i64, 0)
            .map(|t| t.format("%H:%M:%S UTC").to_string())
            .unwrap_or_else(|| format!("t={}", alert.trigger_timestamp));
        tracing::info!(
            "{} #{} at {}: {} | {} wallet(s) | mcap ${:.0} | buys: {}",
            kind,
            alert.id,
            when,
            alert
                .token_symbol
                .as_deref()
                .unwrap_or(alert.token_mint.as_str()),
            alert.wallets_involved.len(),
            alert.alert_market_cap,
            events
                .iter()
                .map(|e| format!("{}(${:.0})", &e.wallet[..e.wallet.len().min(8)], e.amount_usd))
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AlertStatus;

    #[tokio::test]
    async fn test_delivery_always_succeeds() {
        let sink = TracingAlertSink::new();
        let alert = AlertRecord {
            id: 7,
            token_mint: "M1".to_string(),
            token_symbol: Some("TT".to_string()),
            wallets_involved: vec!["W1".to_string(), "W2".to_string(), "W3".to_string()],
            alert_market_cap: 250_000.0,
            trigger_timestamp: 1000,
            status: AlertStatus::PendingEval,
            classification: None,
            is_bullish: true,
            alert_count: 2,
            first_alert_mcap: Some(180_000.0),
        };
        assert!(sink.deliver(&alert, &[]).await.is_ok());
    }
}
