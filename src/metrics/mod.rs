use std::time::Duration;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

// Store metrics
pub const PRICES_UPSERTED_TOTAL: &str = "prices_upserted_total";
pub const PRICES_SKIPPED_TOTAL: &str = "prices_skipped_total";
pub const INTEGRITY_VIOLATIONS_TOTAL: &str = "price_integrity_violations_total";

// Database metrics
pub const DATABASE_QUERY_DURATION_SECONDS: &str = "database_query_duration_seconds";

pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Suffix(DATABASE_QUERY_DURATION_SECONDS.to_string()),
            &[0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0],
        )?
        .install_recorder()
}

pub fn record_prices_upserted(area: &str, count: u64) {
    counter!(PRICES_UPSERTED_TOTAL, "area" => area.to_string()).increment(count);
}

pub fn record_prices_skipped(area: &str, count: u64) {
    counter!(PRICES_SKIPPED_TOTAL, "area" => area.to_string()).increment(count);
}

pub fn record_integrity_violation(area: &str) {
    counter!(INTEGRITY_VIOLATIONS_TOTAL, "area" => area.to_string()).increment(1);
}

pub fn record_db_query_duration(operation: &str, duration: Duration) {
    histogram!(DATABASE_QUERY_DURATION_SECONDS, "operation" => operation.to_string())
        .record(duration.as_secs_f64());
}
