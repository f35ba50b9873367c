//! Domain Layer - Core correlation, filtering, and scoring logic
//!
//! Pure business logic with no I/O. Every time-dependent operation
//! takes an explicit unix-second timestamp so the whole layer is
//! deterministic under test; the application layer supplies wall-clock
//! time and the ports supply external data.
//!
//! Modules:
//! - `event`: normalized buy events and live token stats
//! - `known_programs`: DEX program allowlist and token denylist
//! - `filter`: the fixed-order accept/reject rule chain
//! - `window`: per-token distinct-wallet accumulation windows
//! - `alert`: alert records and the per-token decision state machine
//! - `outcome`: deferred market-cap checks and alert classification
//! - `wallet_score`: per-wallet trust scoring (the feedback loop)
//! - `persistence`: crash-recovery snapshots with invariant validation

pub mod alert;
pub mod event;
pub mod filter;
pub mod known_programs;
pub mod outcome;
pub mod persistence;
pub mod wallet_score;
pub mod window;

pub use alert::{
    AlertMachine, AlertPhase, AlertPolicy, AlertRecord, AlertStatus, AlertTicket, CooldownEntry,
};
pub use event::{BuyEvent, TokenStats};
pub use filter::{EvalContext, FilterConfig, FilterPipeline, RejectReason, Verdict};
pub use known_programs::{is_excluded_mint, is_known_dex_program, KNOWN_DEX_PROGRAMS, WSOL_MINT};
pub use outcome::{
    CheckKind, CheckPoint, OutcomeClass, OutcomeConfig, OutcomeEvaluation, PendingCheck,
    CHECK_POINTS,
};
pub use persistence::{StateError, StateSnapshot, STATE_FILE};
pub use wallet_score::{ScoreBook, ScorerConfig, TrustStatus, WalletScore};
pub use window::{TokenWindow, WindowEntry, WindowState};
