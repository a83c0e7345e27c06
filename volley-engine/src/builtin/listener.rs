//! Result listeners

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::Duration;
use tracing::info;
use volley_core::{ElementSpec, Listener, SampleEvent, SampleResult, TestElement};

pub const SUMMARY_LISTENER_SPEC: ElementSpec = ElementSpec {
    kind: "summary_listener",
    clonable: false,
    properties: &[],
};

/// Aggregate figures for one sample label
#[derive(Debug, Clone, PartialEq)]
pub struct LabelSummary {
    pub label: String,
    pub count: u64,
    pub errors: u64,
    pub total: Duration,
    pub min: Duration,
    pub max: Duration,
}

impl LabelSummary {
    fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            count: 0,
            errors: 0,
            total: Duration::ZERO,
            min: Duration::MAX,
            max: Duration::ZERO,
        }
    }

    fn add(&mut self, result: &SampleResult) {
        self.count += 1;
        if !result.success {
            self.errors += 1;
        }
        self.total += result.elapsed;
        self.min = self.min.min(result.elapsed);
        self.max = self.max.max(result.elapsed);
    }

    pub fn average(&self) -> Duration {
        match u32::try_from(self.count) {
            Ok(0) | Err(_) => Duration::ZERO,
            Ok(count) => self.total / count,
        }
    }

    pub fn error_rate(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.errors as f64 / self.count as f64
        }
    }
}

/// Per-label counts and timings of every sample it hears
#[derive(Debug, Default)]
pub struct SummaryListener {
    labels: Mutex<BTreeMap<String, LabelSummary>>,
}

impl SummaryListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current figures, ordered by label
    pub fn report(&self) -> Vec<LabelSummary> {
        self.labels.lock().values().cloned().collect()
    }

    /// The report as a fixed-width table
    pub fn render(summaries: &[LabelSummary]) -> String {
        let width = summaries
            .iter()
            .map(|s| s.label.len())
            .max()
            .unwrap_or(0)
            .max("label".len());
        let mut out = format!(
            "{:<width$}  {:>8}  {:>8}  {:>8}  {:>8}  {:>8}  {:>7}\n",
            "label", "samples", "avg ms", "min ms", "max ms", "errors", "error %"
        );
        for s in summaries {
            let _ = writeln!(
                out,
                "{:<width$}  {:>8}  {:>8}  {:>8}  {:>8}  {:>8}  {:>6.2}%",
                s.label,
                s.count,
                s.average().as_millis(),
                s.min.as_millis(),
                s.max.as_millis(),
                s.errors,
                s.error_rate() * 100.0
            );
        }
        out
    }
}

impl Listener for SummaryListener {
    fn test_started(&self, _element: &TestElement) -> volley_core::Result<()> {
        self.labels.lock().clear();
        Ok(())
    }

    fn test_ended(&self, element: &TestElement) -> volley_core::Result<()> {
        let labels = self.labels.lock();
        let samples: u64 = labels.values().map(|s| s.count).sum();
        let errors: u64 = labels.values().map(|s| s.errors).sum();
        info!(
            listener = %element.name(),
            labels = labels.len(),
            samples,
            errors,
            "Test summary"
        );
        Ok(())
    }

    fn sample_occurred(&self, _element: &TestElement, event: &SampleEvent<'_>) {
        let mut labels = self.labels.lock();
        labels
            .entry(event.result.label.clone())
            .or_insert_with(|| LabelSummary::new(&event.result.label))
            .add(event.result);
    }
}

/// A result as delivered to a [`CollectingListener`]
#[derive(Debug, Clone)]
pub struct CollectedSample {
    pub thread_group: String,
    pub thread_name: String,
    pub result: SampleResult,
}

/// Keeps every notification for later inspection
#[derive(Debug, Default)]
pub struct CollectingListener {
    samples: Mutex<Vec<CollectedSample>>,
    iterations: Mutex<Vec<(String, u64)>>,
    lifecycle: Mutex<(usize, usize)>,
}

impl CollectingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn samples(&self) -> Vec<CollectedSample> {
        self.samples.lock().clone()
    }

    /// Labels of the samples heard so far, in arrival order
    pub fn labels(&self) -> Vec<String> {
        self.samples
            .lock()
            .iter()
            .map(|s| s.result.label.clone())
            .collect()
    }

    /// `(thread name, iteration)` of every iteration start
    pub fn iterations(&self) -> Vec<(String, u64)> {
        self.iterations.lock().clone()
    }

    /// How often `test_started` and `test_ended` were called
    pub fn lifecycle(&self) -> (usize, usize) {
        *self.lifecycle.lock()
    }
}

impl Listener for CollectingListener {
    fn test_started(&self, _element: &TestElement) -> volley_core::Result<()> {
        self.lifecycle.lock().0 += 1;
        Ok(())
    }

    fn test_ended(&self, _element: &TestElement) -> volley_core::Result<()> {
        self.lifecycle.lock().1 += 1;
        Ok(())
    }

    fn iteration_started(&self, _element: &TestElement, thread_name: &str, iteration: u64) {
        self.iterations
            .lock()
            .push((thread_name.to_string(), iteration));
    }

    fn sample_occurred(&self, _element: &TestElement, event: &SampleEvent<'_>) {
        self.samples.lock().push(CollectedSample {
            thread_group: event.thread_group.to_string(),
            thread_name: event.thread_name.to_string(),
            result: event.result.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event<'a>(result: &'a SampleResult) -> SampleEvent<'a> {
        SampleEvent {
            result,
            thread_group: "users",
            thread_name: "users 1-1",
        }
    }

    #[test]
    fn test_summary_per_label() {
        let listener = SummaryListener::new();
        let element = SUMMARY_LISTENER_SPEC.instantiate("summary");
        listener.test_started(&element).unwrap();

        for (label, ms, ok) in [("home", 10, true), ("home", 30, false), ("login", 5, true)] {
            let mut result = SampleResult::new(label);
            result.elapsed = Duration::from_millis(ms);
            result.success = ok;
            listener.sample_occurred(&element, &event(&result));
        }

        let report = listener.report();
        assert_eq!(report.len(), 2);
        assert_eq!(report[0].label, "home");
        assert_eq!(report[0].count, 2);
        assert_eq!(report[0].errors, 1);
        assert_eq!(report[0].average(), Duration::from_millis(20));
        assert_eq!(report[0].min, Duration::from_millis(10));
        assert_eq!(report[0].max, Duration::from_millis(30));
        assert!((report[0].error_rate() - 0.5).abs() < f64::EPSILON);

        let table = SummaryListener::render(&report);
        assert_eq!(table.lines().count(), 3);
        assert!(table.lines().nth(1).unwrap().starts_with("home "));

        listener.test_started(&element).unwrap();
        assert!(listener.report().is_empty());
    }

    #[test]
    fn test_collecting_listener() {
        let listener = CollectingListener::new();
        let element = TestElement::new("collect");
        listener.test_started(&element).unwrap();
        listener.iteration_started(&element, "users 1-1", 1);
        listener.sample_occurred(&element, &event(&SampleResult::new("a")));
        listener.test_ended(&element).unwrap();

        assert_eq!(listener.labels(), vec!["a".to_string()]);
        assert_eq!(listener.samples()[0].thread_group, "users");
        assert_eq!(listener.iterations(), vec![("users 1-1".to_string(), 1)]);
        assert_eq!(listener.lifecycle(), (1, 1));
    }
}
