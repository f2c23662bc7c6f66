// Prometheus metrics for the interview API

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref SESSIONS_OPENED: IntCounterVec = IntCounterVec::new(
        Opts::new("interview_sessions_opened_total", "Sessions created or resumed"),
        &["outcome"]
    ).expect("metric can be created");

    pub static ref EXECUTIONS_SUBMITTED: IntCounter = IntCounter::new(
        "interview_executions_submitted_total",
        "Executions accepted by the judge"
    ).expect("metric can be created");

    pub static ref SUBMISSIONS_REJECTED: IntCounterVec = IntCounterVec::new(
        Opts::new("interview_submissions_rejected_total", "Submissions refused before reaching the judge"),
        &["reason"]
    ).expect("metric can be created");

    pub static ref EXECUTIONS_FINALIZED: IntCounterVec = IntCounterVec::new(
        Opts::new("interview_executions_finalized_total", "Executions that reached a terminal judge status"),
        &["status"]
    ).expect("metric can be created");

    pub static ref EXECUTIONS_ABANDONED: IntCounter = IntCounter::new(
        "interview_executions_abandoned_total",
        "Executions given up on at the poll deadline"
    ).expect("metric can be created");

    pub static ref JUDGE_POLL_FAILURES: IntCounter = IntCounter::new(
        "interview_judge_poll_failures_total",
        "Failed polls against the remote judge"
    ).expect("metric can be created");

    pub static ref EVENT_STREAMS: IntCounterVec = IntCounterVec::new(
        Opts::new("interview_event_streams_total", "Real-time result streams by outcome"),
        &["outcome"]
    ).expect("metric can be created");
}

/// Register every collector with the shared registry. Safe to call more than once.
pub fn register_metrics() {
    let _ = REGISTRY.register(Box::new(SESSIONS_OPENED.clone()));
    let _ = REGISTRY.register(Box::new(EXECUTIONS_SUBMITTED.clone()));
    let _ = REGISTRY.register(Box::new(SUBMISSIONS_REJECTED.clone()));
    let _ = REGISTRY.register(Box::new(EXECUTIONS_FINALIZED.clone()));
    let _ = REGISTRY.register(Box::new(EXECUTIONS_ABANDONED.clone()));
    let _ = REGISTRY.register(Box::new(JUDGE_POLL_FAILURES.clone()));
    let _ = REGISTRY.register(Box::new(EVENT_STREAMS.clone()));
}

/// Render the registry in the Prometheus text format
pub fn render() -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_registered_metrics() {
        register_metrics();
        register_metrics();
        EXECUTIONS_SUBMITTED.inc();
        EXECUTIONS_FINALIZED.with_label_values(&["Accepted"]).inc();

        let text = render().unwrap();
        assert!(text.contains("interview_executions_submitted_total"));
        assert!(text.contains("interview_executions_finalized_total{status=\"Accepted\"}"));
    }
}
