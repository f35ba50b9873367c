use async_trait::async_trait;
use thiserror::Error;

use crate::domain::TokenStats;

/// Token data error type
#[derive(Error, Debug, Clone)]
pub enum TokenDataError {
    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("No data for token: {0}")]
    NoData(String),

    #[error("Data parsing error: {0}")]
    ParseError(String),

    #[error("Rate limited")]
    RateLimited,
}

/// Price/liquidity source port.
///
/// Queried on demand by token mint. A failed lookup returns an explicit
/// error - implementations must never substitute zeroed stats, the
/// filter would misread them as a real (failing) token.
#[async_trait]
pub trait TokenDataPort: Send + Sync {
    /// Fetch current stats for a token
    async fn token_stats(&self, mint: &str) -> Result<TokenStats, TokenDataError>;
}
