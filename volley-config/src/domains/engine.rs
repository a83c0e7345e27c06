//! Engine configuration

use crate::domains::utils::serde_millis;
use crate::error::ConfigResult;
use crate::validation::{validate_positive_duration, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the engine starts and stops threads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Time a forced stop waits for each thread
    #[serde(rename = "thread_stop_timeout_ms", with = "serde_millis")]
    pub thread_stop_timeout: Duration,

    /// Pause per active thread after interrupting, before waiting
    #[serde(rename = "grace_per_thread_ms", with = "serde_millis")]
    pub grace_per_thread: Duration,

    /// Exit the process when a forced stop leaves threads running
    #[serde(default = "crate::domains::utils::default_false")]
    pub exit_on_stop_failure: bool,

    /// Create threads at their start time instead of all up front
    #[serde(default = "crate::domains::utils::default_false")]
    pub delayed_start_default: bool,

    /// Run thread groups one after another regardless of the plan
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serialized_override: Option<bool>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            thread_stop_timeout: Duration::from_millis(5000),
            grace_per_thread: Duration::from_millis(10),
            exit_on_stop_failure: false,
            delayed_start_default: false,
            serialized_override: None,
        }
    }
}

impl Validatable for EngineConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive_duration(
            self.thread_stop_timeout,
            "thread_stop_timeout_ms",
            self.domain_name(),
        )?;
        if self.thread_stop_timeout < Duration::from_millis(100) {
            log::warn!(
                "thread_stop_timeout_ms of {} leaves little time for threads to exit",
                self.thread_stop_timeout.as_millis()
            );
        }
        if self.grace_per_thread > self.thread_stop_timeout {
            return Err(self.validation_error(
                "grace_per_thread_ms cannot exceed thread_stop_timeout_ms",
            ));
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "engine"
    }
}
