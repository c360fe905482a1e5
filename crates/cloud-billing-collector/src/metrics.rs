//! Collector counters, rendered in Prometheus text exposition format.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters exposed on `/metrics`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    /// Batches accepted by the billing sink.
    SinkSucceeded,
    /// Batches the billing sink rejected or never received.
    SinkFailed,
    /// Successful inventory and usage fetches.
    ProviderSucceeded,
    /// Failed inventory and usage fetches.
    ProviderFailed,
    /// Records delivered to the billing sink.
    RecordsSent,
    /// Runs that ended in an error.
    RunsFailed,
}

impl Counter {
    /// All counters, in render order.
    pub const ALL: [Self; 6] = [
        Self::SinkSucceeded,
        Self::SinkFailed,
        Self::ProviderSucceeded,
        Self::ProviderFailed,
        Self::RecordsSent,
        Self::RunsFailed,
    ];

    /// Metric name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::SinkSucceeded => "billing_collector_sink_succeeded_total",
            Self::SinkFailed => "billing_collector_sink_failed_total",
            Self::ProviderSucceeded => "billing_collector_provider_succeeded_total",
            Self::ProviderFailed => "billing_collector_provider_failed_total",
            Self::RecordsSent => "billing_collector_records_sent_total",
            Self::RunsFailed => "billing_collector_runs_failed_total",
        }
    }

    const fn help(self) -> &'static str {
        match self {
            Self::SinkSucceeded => "Batches successfully sent to the billing API",
            Self::SinkFailed => "Batches the billing API did not accept",
            Self::ProviderSucceeded => "Successful inventory and usage fetches",
            Self::ProviderFailed => "Failed inventory and usage fetches",
            Self::RecordsSent => "Billing records sent to the billing API",
            Self::RunsFailed => "Collector runs that ended in an error",
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

/// Thread-safe collector counters.
#[derive(Debug, Default)]
pub struct CollectorMetrics {
    values: [AtomicU64; Counter::ALL.len()],
}

impl CollectorMetrics {
    /// Create zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment a counter by 1.
    pub fn inc(&self, counter: Counter) {
        self.add(counter, 1);
    }

    /// Increment a counter by a given amount.
    pub fn add(&self, counter: Counter, value: u64) {
        self.values[counter.index()].fetch_add(value, Ordering::Relaxed);
    }

    /// Current value of a counter.
    #[must_use]
    pub fn get(&self, counter: Counter) -> u64 {
        self.values[counter.index()].load(Ordering::Relaxed)
    }

    /// Render all counters in Prometheus text exposition format.
    #[must_use]
    pub fn render(&self) -> String {
        let mut output = String::new();
        for counter in Counter::ALL {
            let name = counter.name();
            // writing to a String cannot fail
            let _ = writeln!(output, "# HELP {name} {}", counter.help());
            let _ = writeln!(output, "# TYPE {name} counter");
            let _ = writeln!(output, "{name} {}", self.get(counter));
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let metrics = CollectorMetrics::new();
        for counter in Counter::ALL {
            assert_eq!(metrics.get(counter), 0);
        }
    }

    #[test]
    fn counters_are_independent() {
        let metrics = CollectorMetrics::new();
        metrics.inc(Counter::SinkFailed);
        metrics.add(Counter::RecordsSent, 42);

        assert_eq!(metrics.get(Counter::SinkFailed), 1);
        assert_eq!(metrics.get(Counter::RecordsSent), 42);
        assert_eq!(metrics.get(Counter::SinkSucceeded), 0);
    }

    #[test]
    fn render_exposition_format() {
        let metrics = CollectorMetrics::new();
        metrics.add(Counter::RecordsSent, 3);

        let output = metrics.render();
        assert!(output.contains("# TYPE billing_collector_records_sent_total counter\n"));
        assert!(output.contains("billing_collector_records_sent_total 3\n"));
        assert!(output.contains("billing_collector_sink_failed_total 0\n"));
    }
}
