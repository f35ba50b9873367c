//! Configuration loading and validation

pub mod loader;

pub use loader::{
    load_config, Config, ConfigError, CorrelationSection, FiltersSection, LoggingSection,
    OutcomeSection, PersistenceSection, ScoringSection,
};
