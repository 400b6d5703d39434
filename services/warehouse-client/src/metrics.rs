//! Prometheus metrics exposition
//!
//! - `oauth_token_requests_total` (counter): labels `grant`, `outcome`
//! - `oauth_login_failures_total` (counter): label `reason`
//! - `warehouse_statements_total` (counter): label `outcome`
//! - `warehouse_statement_duration_seconds` (histogram): label `outcome`
//!
//! Refresh-grant outcomes are recorded by the token accessor itself; the
//! code grant is recorded here when the callback completes.

use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

const STATEMENT_DURATION: &str = "warehouse_statement_duration_seconds";

/// Bucket boundaries from 50ms to 5 minutes, covering interactive queries up
/// to the longest synchronous statement timeout we allow.
const STATEMENT_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0];

fn builder() -> PrometheusBuilder {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(STATEMENT_DURATION.to_string()), STATEMENT_BUCKETS)
        .expect("failed to set histogram buckets")
}

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_recorder() -> PrometheusHandle {
    builder()
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Record an authorization code exchange.
pub fn record_code_exchange(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    metrics::counter!("oauth_token_requests_total", "grant" => "authorization_code", "outcome" => outcome)
        .increment(1);
}

/// Record a login aborted at callback time.
pub fn record_login_failure(reason: &'static str) {
    metrics::counter!("oauth_login_failures_total", "reason" => reason).increment(1);
}

/// Record a warehouse statement with its outcome label.
pub fn record_statement(outcome: &'static str, duration_secs: f64) {
    metrics::counter!("warehouse_statements_total", "outcome" => outcome).increment(1);
    metrics::histogram!(STATEMENT_DURATION, "outcome" => outcome).record(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusRecorder;

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        record_code_exchange(true);
        record_login_failure("state_mismatch");
        record_statement("success", 0.1);
    }

    /// Isolated recorder/handle pair; install_recorder() may only run once
    /// per process.
    fn isolated_recorder() -> (PrometheusRecorder, PrometheusHandle) {
        let recorder = builder().build_recorder();
        let handle = recorder.handle();
        (recorder, handle)
    }

    #[test]
    fn token_and_login_counters_carry_labels() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_code_exchange(true);
        record_code_exchange(false);
        record_login_failure("state_mismatch");

        let output = handle.render();
        assert!(output.contains("oauth_token_requests_total"));
        assert!(output.contains("grant=\"authorization_code\""));
        assert!(output.contains("outcome=\"success\""));
        assert!(output.contains("outcome=\"failure\""));
        assert!(output.contains("oauth_login_failures_total"));
        assert!(output.contains("reason=\"state_mismatch\""));
    }

    #[test]
    fn statement_histogram_renders_buckets() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_statement("rejected", 0.2);

        let output = handle.render();
        assert!(output.contains("warehouse_statements_total"));
        assert!(output.contains("outcome=\"rejected\""));
        assert!(output.contains("warehouse_statement_duration_seconds_bucket"));
        assert!(output.contains("le=\"300\""));
        assert!(output.contains("le=\"+Inf\""));
    }
}
