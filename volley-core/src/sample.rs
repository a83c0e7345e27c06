//! Sample results produced by samplers and transactions

use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

/// Outcome of one sampler execution, possibly with child results
#[derive(Debug, Clone, PartialEq)]
pub struct SampleResult {
    pub label: String,
    pub success: bool,
    pub response_code: String,
    pub response_message: String,
    pub response_data: String,
    pub start_time: DateTime<Utc>,
    pub elapsed: Duration,
    /// Time spent in timers, excluded from transaction totals when requested
    pub idle_time: Duration,
    pub thread_name: String,
    pub assertion_failures: Vec<String>,
    pub sub_results: Vec<SampleResult>,
}

impl SampleResult {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            success: true,
            response_code: String::new(),
            response_message: String::new(),
            response_data: String::new(),
            start_time: Utc::now(),
            elapsed: Duration::ZERO,
            idle_time: Duration::ZERO,
            thread_name: String::new(),
            assertion_failures: Vec::new(),
            sub_results: Vec::new(),
        }
    }

    /// Runs `work` and records its wall time on the returned result
    pub fn timed(label: impl Into<String>, work: impl FnOnce(&mut SampleResult)) -> Self {
        let mut result = SampleResult::new(label);
        result.start_time = Utc::now();
        let started = Instant::now();
        work(&mut result);
        result.elapsed = started.elapsed();
        result
    }

    pub fn with_response(mut self, code: impl Into<String>, message: impl Into<String>) -> Self {
        self.response_code = code.into();
        self.response_message = message.into();
        self
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.response_data = data.into();
        self
    }

    pub fn failed(mut self) -> Self {
        self.success = false;
        self
    }

    /// Records a failed assertion and marks the sample failed
    pub fn add_assertion_failure(&mut self, message: impl Into<String>) {
        self.success = false;
        self.assertion_failures.push(message.into());
    }

    pub fn add_sub_result(&mut self, child: SampleResult) {
        self.sub_results.push(child);
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.start_time
            + chrono::Duration::from_std(self.elapsed).unwrap_or_else(|_| chrono::Duration::zero())
    }
}
