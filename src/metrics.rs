use metrics::{counter, histogram};
use tracing::trace;

// Recorded into whatever recorder is installed; a no-op in tests.

pub fn inc_requests(route: &'static str) {
    counter!("affilink_http_requests_total", "route" => route).increment(1);
    trace!(target = "affilink.metrics", route, "requests_total_inc");
}

pub fn inc_intent(intent: &'static str) {
    counter!("affilink_messages_total", "intent" => intent).increment(1);
    trace!(target = "affilink.metrics", intent, "messages_total_inc");
}

pub fn inc_shortener(provider: &'static str) {
    counter!("affilink_short_links_total", "provider" => provider).increment(1);
}

/// Wall time of one pipeline stage, exported in seconds.
pub fn stage_elapsed(stage: &'static str, elapsed_ms: u128) {
    histogram!("affilink_stage_seconds", "stage" => stage).record(elapsed_ms as f64 / 1000.0);
    trace!(
        target = "affilink.metrics",
        stage,
        elapsed_ms = elapsed_ms as u64,
        "stage_elapsed"
    );
}
