//! Domain-driven configuration for Volley
//!
//! Configuration is split by domain (engine, logging, properties), loaded
//! from YAML with defaults for everything, overridden by `VOLLEY_*`
//! environment variables and validated per domain.

pub mod error;
pub mod loader;
pub mod validation;

pub mod domains;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use validation::Validatable;

pub use domains::{
    engine::EngineConfig,
    logging::{LogFormat, LogLevel, LoggingConfig},
    VolleyConfig,
};
