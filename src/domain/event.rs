//! Buy Event Types
//!
//! The normalized purchase event handed to the core by the external
//! event normalizer, plus the live token statistics snapshot used by
//! the filter pipeline and revalidation.

use serde::{Deserialize, Serialize};

/// A normalized token purchase by a tracked wallet.
///
/// Produced by the external event normalizer (webhook or polling, the
/// core does not care which). Uniquely identified by `tx_signature` and
/// consumed exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuyEvent {
    /// Buying wallet address (base58)
    pub wallet: String,
    /// Purchased token mint address (base58)
    pub token_mint: String,
    /// Token symbol if the normalizer resolved it
    #[serde(default)]
    pub token_symbol: Option<String>,
    /// Transaction signature (unique event identity)
    pub tx_signature: String,
    /// Purchase value in USD at buy time
    pub amount_usd: f64,
    /// Token market cap in USD at buy time
    pub market_cap_at_buy: f64,
    /// Unix timestamp (seconds) of the purchase
    pub timestamp: u64,
    /// Program IDs of the instructions in the underlying transaction.
    /// Empty when the normalizer could not attach them.
    #[serde(default)]
    pub program_ids: Vec<String>,
}

impl BuyEvent {
    /// Symbol for logging, falling back to a shortened mint.
    pub fn display_symbol(&self) -> String {
        match &self.token_symbol {
            Some(s) if !s.is_empty() => s.clone(),
            _ => {
                let mint = &self.token_mint;
                if mint.len() > 8 {
                    format!("{}...", &mint[..8])
                } else {
                    mint.clone()
                }
            }
        }
    }
}

/// Live token statistics from the price/liquidity source.
///
/// Failure to fetch these is an explicit error at the port boundary,
/// never a zeroed-out value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TokenStats {
    /// Pool liquidity in USD
    pub liquidity_usd: f64,
    /// 24-hour traded volume in USD
    pub volume_24h_usd: f64,
    /// 24-hour trade count (buys + sells)
    pub trade_count_24h: u64,
    /// Market cap in USD
    pub market_cap_usd: f64,
}
