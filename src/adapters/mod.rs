//! Adapters Layer - Implementations of the ports
//!
//! - `dexscreener`: token stats over the public DexScreener API
//! - `jsonl_source`: buy event replay from a JSON-lines file
//! - `log_sink`: alert delivery into the structured log

pub mod dexscreener;
pub mod jsonl_source;
pub mod log_sink;

pub use dexscreener::DexScreenerClient;
pub use jsonl_source::JsonlEventSource;
pub use log_sink::TracingAlertSink;
