//! DexScreener Token Data Client
//!
//! Implements the token data port against the public DexScreener API.
//! A token may trade in several pools; stats come from the Solana pair
//! with the deepest liquidity.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::domain::TokenStats;
use crate::ports::token_data::{TokenDataError, TokenDataPort};

const DEXSCREENER_TOKENS_API: &str = "https://api.dexscreener.com/latest/dex/tokens";

#[derive(Debug, Clone)]
pub struct DexScreenerClient {
    http: Client,
}

impl DexScreenerClient {
    pub fn new() -> Result<Self, TokenDataError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| TokenDataError::HttpError(e.to_string()))?;
        Ok(Self { http })
    }

    fn best_pair(response: TokensResponse) -> Option<Pair> {
        let pairs = response.pairs?;
        let mut candidates: Vec<Pair> = pairs
            .iter()
            .filter(|p| p.chain_id.as_deref() == Some("solana"))
            .cloned()
            .collect();
        if candidates.is_empty() {
            candidates = pairs;
        }
        candidates.into_iter().max_by(|a, b| {
            a.liquidity_usd()
                .partial_cmp(&b.liquidity_usd())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    }
}

#[async_trait]
impl TokenDataPort for DexScreenerClient {
    async fn token_stats(&self, mint: &str) -> Result<TokenStats, TokenDataError> {
        let url = format!("{}/{}", DEXSCREENER_TOKENS_API, mint);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| TokenDataError::HttpError(e.to_string()))?;

        if response.status().as_u16() == 429 {
            return Err(TokenDataError::RateLimited);
        }

        let body: TokensResponse = response
            .json()
            .await
            .map_err(|e| TokenDataError::ParseError(e.to_string()))?;

        let pair =
            Self::best_pair(body).ok_or_else(|| TokenDataError::NoData(mint.to_string()))?;

        Ok(pair.into_stats())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct TokensResponse {
    pairs: Option<Vec<Pair>>,
}

#[derive(Debug, Clone, Deserialize)]
struct Pair {
    #[serde(rename = "chainId")]
    chain_id: Option<String>,
    liquidity: Option<Liquidity>,
    volume: Option<Volume>,
    txns: Option<Txns>,
    #[serde(rename = "marketCap")]
    market_cap: Option<f64>,
    /// Fully diluted valuation - fallback when marketCap is absent
    fdv: Option<f64>,
}

impl Pair {
    fn liquidity_usd(&self) -> f64 {
        self.liquidity.as_ref().and_then(|l| l.usd).unwrap_or(0.0)
    }

    fn into_stats(self) -> TokenStats {
        let liquidity_usd = self.liquidity_usd();
        let volume_24h_usd = self.volume.as_ref().and_then(|v| v.h24).unwrap_or(0.0);
        let trade_count_24h = self
            .txns
            .as_ref()
            .and_then(|t| t.h24.as_ref())
            .map(|h| h.buys.unwrap_or(0) + h.sells.unwrap_or(0))
            .unwrap_or(0);
        let market_cap_usd = self.market_cap.or(self.fdv).unwrap_or(0.0);

        TokenStats {
            liquidity_usd,
            volume_24h_usd,
            trade_count_24h,
            market_cap_usd,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct Liquidity {
    usd: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct Volume {
    h24: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct Txns {
    h24: Option<TxnCounts>,
}

#[derive(Debug, Clone, Deserialize)]
struct TxnCounts {
    buys: Option<u64>,
    sells: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        assert!(DexScreenerClient::new().is_ok());
    }

    #[test]
    fn test_best_pair_prefers_solana_and_liquidity() {
        let body = r#"{
            "pairs": [
                {"chainId": "ethereum", "liquidity": {"usd": 900000.0}},
                {"chainId": "solana", "liquidity": {"usd": 10000.0}},
                {"chainId": "solana", "liquidity": {"usd": 55000.0},
                 "volume": {"h24": 120000.0},
                 "txns": {"h24": {"buys": 300, "sells": 250}},
                 "marketCap": 400000.0}
            ]
        }"#;
        let response: TokensResponse = serde_json::from_str(body).unwrap();
        let pair = DexScreenerClient::best_pair(response).unwrap();
        let stats = pair.into_stats();
        assert_eq!(stats.liquidity_usd, 55_000.0);
        assert_eq!(stats.volume_24h_usd, 120_000.0);
        assert_eq!(stats.trade_count_24h, 550);
        assert_eq!(stats.market_cap_usd, 400_000.0);
    }

    #[test]
    fn test_fdv_fallback_when_no_market_cap() {
        let body = r#"{
            "pairs": [
                {"chainId": "solana", "liquidity": {"usd": 20000.0}, "fdv": 150000.0}
            ]
        }"#;
        let response: TokensResponse = serde_json::from_str(body).unwrap();
        let stats = DexScreenerClient::best_pair(response).unwrap().into_stats();
        assert_eq!(stats.market_cap_usd, 150_000.0);
    }

    #[test]
    fn test_no_pairs_yields_none() {
        let response: TokensResponse = serde_json::from_str(r#"{"pairs": null}"#).unwrap();
        assert!(DexScreenerClient::best_pair(response).is_none());
    }
}
