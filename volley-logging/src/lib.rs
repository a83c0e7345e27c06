//! Logging setup for Volley binaries
//!
//! Everything logs through `tracing`; these helpers install the global
//! subscriber once, from a level string or from [`LoggingConfig`].

mod init;

pub use init::{filter_directives, init_logging_from_config, init_simple_tracing};
pub use volley_config::LoggingConfig;
