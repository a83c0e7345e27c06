//! Aggregation of the samples within one transaction pass

use std::time::{Duration, Instant};
use volley_control::kind::{GENERATE_PARENT_SAMPLE, INCLUDE_TIMERS};
use volley_core::{SampleResult, TestElement, ThreadContext};

/// Results collected for one transaction controller in one thread
#[derive(Debug)]
pub(crate) struct TransactionState {
    started: Instant,
    samples: usize,
    failures: usize,
    idle: Duration,
    failed_code: Option<String>,
    children: Vec<SampleResult>,
}

impl TransactionState {
    pub fn new(started: Option<Instant>) -> Self {
        Self {
            started: started.unwrap_or_else(Instant::now),
            samples: 0,
            failures: 0,
            idle: Duration::ZERO,
            failed_code: None,
            children: Vec::new(),
        }
    }

    /// Counts a result; `keep` retains it as a sub-result
    pub fn record(&mut self, result: SampleResult, keep: bool) {
        self.samples += 1;
        self.idle += result.idle_time;
        if !result.success {
            self.failures += 1;
            self.failed_code = Some(result.response_code.clone());
        }
        if keep {
            self.children.push(result);
        }
    }

    /// The parent result, labelled by the controller
    pub fn into_result(
        self,
        element: &TestElement,
        thread_name: &str,
        ctx: &mut ThreadContext,
    ) -> SampleResult {
        let include_timers = match element.property(INCLUDE_TIMERS) {
            Some(_) => element.bool(INCLUDE_TIMERS, ctx),
            None => true,
        };
        let wall = self.started.elapsed();

        let mut result = SampleResult::new(element.label(ctx));
        result.start_time = chrono::Utc::now()
            - chrono::Duration::from_std(wall).unwrap_or_else(|_| chrono::Duration::zero());
        result.elapsed = if include_timers {
            wall
        } else {
            wall.saturating_sub(self.idle)
        };
        result.idle_time = self.idle;
        result.thread_name = thread_name.to_string();
        result.success = self.failures == 0;
        result.response_code = match self.failed_code {
            Some(code) => code,
            None => "200".to_string(),
        };
        result.response_message = format!(
            "Number of samples in transaction : {}, number of failing samples : {}",
            self.samples, self.failures
        );
        if element.bool(GENERATE_PARENT_SAMPLE, ctx) {
            for child in self.children {
                result.add_sub_result(child);
            }
        }
        result
    }
}
