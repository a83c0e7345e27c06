//! Domain-specific configuration modules

pub mod engine;
pub mod logging;
pub mod utils;

use crate::error::{ConfigError, ConfigResult};
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Main Volley configuration combining all domains
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct VolleyConfig {
    /// Thread start and stop behaviour
    #[serde(default)]
    pub engine: engine::EngineConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: logging::LoggingConfig,

    /// Initial values of the properties shared by every thread
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

impl VolleyConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.engine.validate()?;
        self.logging.validate()?;

        if self.properties.keys().any(|k| k.trim().is_empty()) {
            return Err(ConfigError::DomainError {
                domain: "properties".to_string(),
                message: "property names cannot be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let config = VolleyConfig::default();
        serde_yaml::to_string(&config)
            .unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}
