use std::time::Duration;

use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};

/// Decision outcome counters and latency histogram, observed once per
/// [`crate::DecisionEngine::check`] call (SPEC_FULL.md §4.4: "observability,
/// grounded in `acteon-gateway`'s `GatewayMetrics`").
///
/// Each instance owns a private [`Registry`] rather than registering into
/// `prometheus::default_registry()`, so multiple engines (e.g. one per
/// test) never collide on metric names.
pub struct EngineMetrics {
    registry: Registry,
    decisions_total: IntCounterVec,
    decision_latency_seconds: HistogramVec,
}

impl EngineMetrics {
    /// Build a fresh metrics set with its own registry.
    ///
    /// # Panics
    ///
    /// Panics if the metric descriptors are malformed, which would indicate
    /// a programming error, not a runtime condition.
    #[must_use]
    pub fn new() -> Self {
        let registry = Registry::new();

        let decisions_total = IntCounterVec::new(
            Opts::new(
                "limitforge_decisions_total",
                "Rate-limit decisions, labeled by algorithm and outcome",
            ),
            &["algorithm", "outcome"],
        )
        .expect("decisions_total metric descriptor is valid");

        let decision_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "limitforge_decision_latency_seconds",
                "Time spent computing one rate-limit decision",
            ),
            &["algorithm"],
        )
        .expect("decision_latency_seconds metric descriptor is valid");

        registry
            .register(Box::new(decisions_total.clone()))
            .expect("decisions_total registers cleanly");
        registry
            .register(Box::new(decision_latency_seconds.clone()))
            .expect("decision_latency_seconds registers cleanly");

        Self {
            registry,
            decisions_total,
            decision_latency_seconds,
        }
    }

    /// The registry backing this metrics set, for mounting a `/metrics`
    /// endpoint (SPEC_FULL.md §6 "Prometheus endpoint").
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub(crate) fn observe(&self, algorithm: &str, allowed: bool, elapsed: Duration) {
        let outcome = if allowed { "allowed" } else { "blocked" };
        self.decisions_total
            .with_label_values(&[algorithm, outcome])
            .inc();
        self.decision_latency_seconds
            .with_label_values(&[algorithm])
            .observe(elapsed.as_secs_f64());
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observing_increments_the_right_label() {
        let metrics = EngineMetrics::new();
        metrics.observe("fixed_window", true, Duration::from_millis(5));
        metrics.observe("fixed_window", false, Duration::from_millis(5));

        let families = metrics.registry.gather();
        let decisions = families
            .iter()
            .find(|f| f.name() == "limitforge_decisions_total")
            .expect("decisions_total family present");
        assert_eq!(decisions.get_metric().len(), 2);
    }
}
