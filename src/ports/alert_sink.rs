use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{AlertRecord, BuyEvent};

/// Alert sink error type
#[derive(Error, Debug)]
pub enum AlertSinkError {
    #[error("Delivery error: {0}")]
    DeliveryError(String),
}

/// Downstream alert delivery.
///
/// Receives the full alert record plus the underlying buy events for
/// formatting. The core considers an alert emitted once handed off;
/// retries and delivery reporting are the sink's problem.
#[async_trait]
pub trait AlertSinkPort: Send + Sync {
    /// Deliver one alert
    async fn deliver(&self, alert: &AlertRecord, events: &[BuyEvent])
        -> Result<(), AlertSinkError>;
}
