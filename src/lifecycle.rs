//! Bounds one crawl's resource lifetime: runs the cycle under a shutdown
//! signal and releases the transport on every exit path.

use std::future::Future;
use std::sync::Arc;

use crate::crawler::{Crawler, CycleReport};
use crate::net::Transport;

/// How one crawl cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed(CycleReport),
    /// Feed-level failure; details were logged.
    Failed,
    /// The shutdown signal fired mid-cycle.
    Cancelled,
}

/// Runs one cycle to completion or cancellation.
///
/// The transport's connection pool is released exactly once regardless of
/// how the cycle terminates. Cancellation is silent (dropping the cycle
/// future abandons all in-flight fetch tasks); a failed cycle is reported
/// through logging and the returned outcome, never by panicking.
pub async fn run_cycle<F>(transport: Arc<Transport>, crawler: &Crawler, shutdown: F) -> CycleOutcome
where
    F: Future<Output = ()>,
{
    let outcome = tokio::select! {
        _ = shutdown => {
            tracing::info!("shutdown requested, abandoning in-flight fetches");
            CycleOutcome::Cancelled
        }
        result = crawler.run_cycle() => match result {
            Ok(report) => CycleOutcome::Completed(report),
            Err(e) => {
                tracing::error!(error = %e, "crawl cycle failed");
                CycleOutcome::Failed
            }
        },
    };
    transport.shutdown();
    outcome
}
