// Prometheus metrics definitions for the tracker.

use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ── Gauges ───────────────────────────────────────────────────────

    /// Users currently tracked in the registry.
    pub static ref TRACKED_USERS: IntGauge =
        IntGauge::new("solvetrack_tracked_users", "Users currently tracked").unwrap();

    /// Challenges known to the catalog.
    pub static ref CATALOG_SIZE: IntGauge =
        IntGauge::new("solvetrack_catalog_size", "Challenges known to the catalog").unwrap();

    // ── Counters ─────────────────────────────────────────────────────

    /// Total solves committed to the ledger.
    pub static ref SOLVES_RECORDED_TOTAL: IntCounter = IntCounter::new(
        "solvetrack_solves_recorded_total",
        "Solves committed to the ledger",
    )
    .unwrap();

    /// Total reconciliation runs, by result (ok, error).
    pub static ref RECONCILE_RUNS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("solvetrack_reconcile_runs_total", "Reconciliation runs"),
        &["result"],
    )
    .unwrap();

    /// Total challenges added by catalog sync.
    pub static ref CHALLENGES_ADDED_TOTAL: IntCounter = IntCounter::new(
        "solvetrack_challenges_added_total",
        "Challenges added by catalog sync",
    )
    .unwrap();

    /// Total polling cycle failures, by loop (catalog, solves).
    pub static ref POLL_ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("solvetrack_poll_errors_total", "Polling cycle failures"),
        &["loop"],
    )
    .unwrap();

    // ── Histograms ───────────────────────────────────────────────────

    /// Duration of one user reconciliation in seconds.
    pub static ref RECONCILE_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "solvetrack_reconcile_duration_seconds",
            "Duration of one user reconciliation",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 15.0]),
    )
    .unwrap();
}

/// Register all metrics with the custom registry. Call once at startup.
pub fn register_metrics() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(TRACKED_USERS.clone()),
        Box::new(CATALOG_SIZE.clone()),
        Box::new(SOLVES_RECORDED_TOTAL.clone()),
        Box::new(RECONCILE_RUNS_TOTAL.clone()),
        Box::new(CHALLENGES_ADDED_TOTAL.clone()),
        Box::new(POLL_ERRORS_TOTAL.clone()),
        Box::new(RECONCILE_DURATION_SECONDS.clone()),
    ];

    for c in collectors {
        REGISTRY.register(c).expect("failed to register metric");
    }
}

/// Serialize all registered metrics to the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_metrics_returns_string() {
        register_metrics();
        let output = gather_metrics();
        assert!(output.is_empty() || output.contains("solvetrack_"));
    }

    #[test]
    fn test_metric_increments() {
        TRACKED_USERS.set(3);
        assert_eq!(TRACKED_USERS.get(), 3);
        TRACKED_USERS.set(0);

        CATALOG_SIZE.set(500);
        assert_eq!(CATALOG_SIZE.get(), 500);

        SOLVES_RECORDED_TOTAL.inc();
        CHALLENGES_ADDED_TOTAL.inc();
        RECONCILE_RUNS_TOTAL.with_label_values(&["ok"]).inc();
        POLL_ERRORS_TOTAL.with_label_values(&["catalog"]).inc();
        RECONCILE_DURATION_SECONDS.observe(0.02);
    }
}
