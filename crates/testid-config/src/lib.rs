//! testid-config: configuration model, loading and logging setup for testid

pub mod config;
pub mod error;
pub mod logging;

pub use config::{
    AppConfig, AttributeConfig, CacheConfig, ElementConfig, IdConfig, IdStrategy, Indentation,
    LogFormat, LoggingConfig, QuoteStyle, RunConfig, ScanConfig,
};
pub use error::{ConfigError, ConfigResult};
