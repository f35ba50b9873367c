//! Sentinel - Smart Money Correlation Monitor Library
//!
//! Watches a curated set of on-chain wallets for token purchases and
//! raises an alert when enough distinct wallets buy the same token
//! within a short window.
//!
//! # Modules
//!
//! - `domain`: Core logic (filter pipeline, windows, alert machine, outcome evaluation, wallet scoring)
//! - `ports`: Trait abstractions (EventSourcePort, TokenDataPort, AlertSinkPort)
//! - `adapters`: External implementations (DexScreener, JSONL replay, log sink)
//! - `config`: Configuration loading and validation
//! - `application`: Correlation engine and outcome scheduler

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
