//! Run metrics emitted as structured log events.

use std::time::Duration;
use tracing::info;

/// Flow run metrics
pub struct RunMetrics;

impl RunMetrics {
    /// Record a single step execution
    pub fn record_step_execution(flow_run_id: &str, step_name: &str, duration: Duration, running: bool) {
        info!(
            target: "flowrun::metrics",
            flow_run_id = %flow_run_id,
            step_name = %step_name,
            duration_ms = duration_ms(duration),
            running,
            "Step execution"
        );
    }

    /// Record a finished (or halted) chain execution
    pub fn record_flow_execution(flow_run_id: &str, duration: Duration, steps: usize, verdict: &str) {
        info!(
            target: "flowrun::metrics",
            flow_run_id = %flow_run_id,
            duration_ms = duration_ms(duration),
            steps,
            verdict = %verdict,
            "Flow execution"
        );
    }
}

/// Milliseconds with sub-millisecond precision
pub fn duration_ms(duration: Duration) -> f64 {
    duration.as_secs() as f64 * 1000.0 + f64::from(duration.subsec_nanos()) / 1_000_000.0
}
