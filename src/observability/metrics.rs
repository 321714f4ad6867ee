//! Commit metrics.
//!
//! # Metrics
//! - `reply_commits_total` (counter): commits by outcome and status
//! - `reply_commit_duration_seconds` (histogram): render plus body copy time
//! - `reply_body_bytes_total` (counter): body bytes handed to writers
//!
//! # Design Decisions
//! - Emitted through the `metrics` facade; exporting is up to the host
//! - Can be switched off from config without touching call sites

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::reply::Outcome;

static ENABLED: AtomicBool = AtomicBool::new(true);

/// Turn commit metrics on or off process-wide.
pub fn set_enabled(enabled: bool) {
    ENABLED.store(enabled, Ordering::Relaxed);
}

pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

/// Record one finished commit.
pub fn record_commit(outcome: &Outcome, started: Instant) {
    if !is_enabled() {
        return;
    }

    let status = outcome
        .status()
        .map(|s| s.as_u16().to_string())
        .unwrap_or_else(|| "none".to_string());

    metrics::counter!(
        "reply_commits_total",
        "outcome" => outcome.label(),
        "status" => status
    )
    .increment(1);

    metrics::histogram!("reply_commit_duration_seconds", "outcome" => outcome.label())
        .record(started.elapsed().as_secs_f64());

    if let Outcome::Written { bytes, .. } | Outcome::Incomplete { bytes, .. } = outcome {
        metrics::counter!("reply_body_bytes_total").increment(*bytes);
    }
}
