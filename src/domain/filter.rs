//! Filter Pipeline
//!
//! Fixed-order rule chain separating genuine smart-money swaps from
//! noise: denylisted tokens, duplicate buys, airdrops/dust, illiquid or
//! oversized tokens, and removed wallets. Rejection is a verdict, not
//! an error - the first failing rule short-circuits and names itself
//! for the audit log, nothing else branches on the reason.

use std::fmt;

use super::event::{BuyEvent, TokenStats};
use super::known_programs::{is_excluded_mint, is_excluded_symbol, is_known_dex_program};
use super::wallet_score::TrustStatus;

/// Default minimum pool liquidity in USD
pub const DEFAULT_MIN_LIQUIDITY_USD: f64 = 5_000.0;

/// Default minimum purchase value in USD (dust floor)
pub const DEFAULT_MIN_BUY_VALUE_USD: f64 = 5.0;

/// Default minimum 24h volume in USD
pub const DEFAULT_MIN_VOLUME_24H_USD: f64 = 10_000.0;

/// Default minimum 24h trade count (buys + sells)
pub const DEFAULT_MIN_TRADE_COUNT_24H: u64 = 15;

/// Default maximum market cap in USD
pub const DEFAULT_MAX_MARKET_CAP_USD: f64 = 700_000.0;

/// Why an event was rejected. Reported for observability only.
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    /// Token is a stablecoin, wrapped native asset, or denylisted major
    DenylistedToken,
    /// Transaction signature already consumed
    DuplicateSignature,
    /// Wallet already counted for this token in the open window
    DuplicateWallet,
    /// No known DEX program among the transaction's instructions
    NoDexProgram,
    /// Live token stats could not be fetched
    StatsUnavailable,
    LowLiquidity { liquidity_usd: f64, minimum: f64 },
    DustBuy { amount_usd: f64, minimum: f64 },
    LowVolume { volume_24h_usd: f64, minimum: f64 },
    LowTradeCount { trade_count_24h: u64, minimum: u64 },
    MarketCapTooHigh { market_cap_usd: f64, maximum: f64 },
    /// Originating wallet has been permanently removed
    WalletRemoved,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::DenylistedToken => write!(f, "denylisted token"),
            RejectReason::DuplicateSignature => write!(f, "signature already processed"),
            RejectReason::DuplicateWallet => write!(f, "wallet already counted in window"),
            RejectReason::NoDexProgram => write!(f, "no known DEX program in transaction"),
            RejectReason::StatsUnavailable => write!(f, "token stats unavailable"),
            RejectReason::LowLiquidity { liquidity_usd, minimum } => {
                write!(f, "liquidity ${:.0} < ${:.0}", liquidity_usd, minimum)
            }
            RejectReason::DustBuy { amount_usd, minimum } => {
                write!(f, "dust buy ${:.2} < ${:.2}", amount_usd, minimum)
            }
            RejectReason::LowVolume { volume_24h_usd, minimum } => {
                write!(f, "24h volume ${:.0} < ${:.0}", volume_24h_usd, minimum)
            }
            RejectReason::LowTradeCount { trade_count_24h, minimum } => {
                write!(f, "24h trades {} < {}", trade_count_24h, minimum)
            }
            RejectReason::MarketCapTooHigh { market_cap_usd, maximum } => {
                write!(f, "market cap ${:.0} > ${:.0}", market_cap_usd, maximum)
            }
            RejectReason::WalletRemoved => write!(f, "wallet removed from tracking"),
        }
    }
}

/// Filter verdict
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Accept,
    Reject(RejectReason),
}

impl Verdict {
    pub fn is_accept(&self) -> bool {
        matches!(self, Verdict::Accept)
    }
}

/// Threshold rules (configuration values, not constants)
#[derive(Debug, Clone, Copy)]
pub struct FilterConfig {
    pub min_liquidity_usd: f64,
    pub min_buy_value_usd: f64,
    pub min_volume_24h_usd: f64,
    pub min_trade_count_24h: u64,
    pub max_market_cap_usd: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_liquidity_usd: DEFAULT_MIN_LIQUIDITY_USD,
            min_buy_value_usd: DEFAULT_MIN_BUY_VALUE_USD,
            min_volume_24h_usd: DEFAULT_MIN_VOLUME_24H_USD,
            min_trade_count_24h: DEFAULT_MIN_TRADE_COUNT_24H,
            max_market_cap_usd: DEFAULT_MAX_MARKET_CAP_USD,
        }
    }
}

/// State the engine gathers before evaluation: window membership, the
/// wallet's trust status (read-only view of scorer state), and the live
/// token stats snapshot (`None` when the source was unavailable).
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub already_counted: bool,
    pub wallet_status: TrustStatus,
    pub stats: Option<&'a TokenStats>,
}

/// The rule chain. Stateless; everything stateful arrives via the
/// context so evaluation itself never takes a lock.
#[derive(Debug, Clone, Default)]
pub struct FilterPipeline {
    config: FilterConfig,
}

impl FilterPipeline {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Rule 1 in isolation, so the engine can skip the stats fetch for
    /// tokens that can never alert.
    pub fn is_denylisted(&self, event: &BuyEvent) -> bool {
        if is_excluded_mint(&event.token_mint) {
            return true;
        }
        match &event.token_symbol {
            Some(symbol) => is_excluded_symbol(symbol),
            None => false,
        }
    }

    /// Run the full rule chain in fixed order. First failure wins.
    pub fn evaluate(&self, event: &BuyEvent, ctx: &EvalContext<'_>) -> Verdict {
        // 1. Token denylist
        if self.is_denylisted(event) {
            return Verdict::Reject(RejectReason::DenylistedToken);
        }

        // 2. Idempotent per-window wallet dedup
        if ctx.already_counted {
            return Verdict::Reject(RejectReason::DuplicateWallet);
        }

        // 3. Swap verification: a known DEX program must appear among
        //    the transaction's instructions. Missing program IDs reject.
        if !event.program_ids.iter().any(|p| is_known_dex_program(p)) {
            return Verdict::Reject(RejectReason::NoDexProgram);
        }

        // 4. Threshold rules, each independent, all must pass
        let Some(stats) = ctx.stats else {
            return Verdict::Reject(RejectReason::StatsUnavailable);
        };
        if stats.liquidity_usd < self.config.min_liquidity_usd {
            return Verdict::Reject(RejectReason::LowLiquidity {
                liquidity_usd: stats.liquidity_usd,
                minimum: self.config.min_liquidity_usd,
            });
        }
        if event.amount_usd < self.config.min_buy_value_usd {
            return Verdict::Reject(RejectReason::DustBuy {
                amount_usd: event.amount_usd,
                minimum: self.config.min_buy_value_usd,
            });
        }
        if stats.volume_24h_usd < self.config.min_volume_24h_usd {
            return Verdict::Reject(RejectReason::LowVolume {
                volume_24h_usd: stats.volume_24h_usd,
                minimum: self.config.min_volume_24h_usd,
            });
        }
        if stats.trade_count_24h < self.config.min_trade_count_24h {
            return Verdict::Reject(RejectReason::LowTradeCount {
                trade_count_24h: stats.trade_count_24h,
                minimum: self.config.min_trade_count_24h,
            });
        }
        if stats.market_cap_usd > self.config.max_market_cap_usd {
            return Verdict::Reject(RejectReason::MarketCapTooHigh {
                market_cap_usd: stats.market_cap_usd,
                maximum: self.config.max_market_cap_usd,
            });
        }

        // 5. Removed wallets are permanently excluded
        if ctx.wallet_status == TrustStatus::Removed {
            return Verdict::Reject(RejectReason::WalletRemoved);
        }

        Verdict::Accept
    }

    /// Second-stage revalidation at threshold crossing: the live-data
    /// subset of rule 4 (liquidity, volume, trade count), catching
    /// tokens whose conditions degraded during accumulation.
    pub fn revalidate(&self, stats: &TokenStats) -> Verdict {
        if stats.liquidity_usd < self.config.min_liquidity_usd {
            return Verdict::Reject(RejectReason::LowLiquidity {
                liquidity_usd: stats.liquidity_usd,
                minimum: self.config.min_liquidity_usd,
            });
        }
        if stats.volume_24h_usd < self.config.min_volume_24h_usd {
            return Verdict::Reject(RejectReason::LowVolume {
                volume_24h_usd: stats.volume_24h_usd,
                minimum: self.config.min_volume_24h_usd,
            });
        }
        if stats.trade_count_24h < self.config.min_trade_count_24h {
            return Verdict::Reject(RejectReason::LowTradeCount {
                trade_count_24h: stats.trade_count_24h,
                minimum: self.config.min_trade_count_24h,
            });
        }
        Verdict::Accept
    }
}
