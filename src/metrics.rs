//! Reporting Sink
//!
//! The cache reports queue status and the number of admitted workloads of each queue after every
//! change. Reports are fire-and-forget: a `[Reporter]` cannot fail and its results are never
//! consulted.

use crate::status::QueueStatus;

/// Sink for queue metrics.
pub trait Reporter {
    /// Report the status of a queue after it was reconciled.
    fn report_cluster_queue_status(&self, cluster_queue: &str, status: QueueStatus);

    /// Report the number of admitted workloads of a queue.
    fn report_admitted_active_workloads(&self, cluster_queue: &str, count: usize);
}

/// Reporter that emits every report as a `tracing` event.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingReporter;

/// Reporter that discards every report.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopReporter;

impl Reporter for TracingReporter {
    fn report_cluster_queue_status(&self, cluster_queue: &str, status: QueueStatus) {
        tracing::debug!(
            target: "r_clusterquota::metrics",
            cluster_queue = cluster_queue,
            status = status.as_str(),
            "cluster_queue_status"
        );
    }

    fn report_admitted_active_workloads(&self, cluster_queue: &str, count: usize) {
        tracing::debug!(
            target: "r_clusterquota::metrics",
            cluster_queue = cluster_queue,
            count = count,
            "admitted_active_workloads"
        );
    }
}

impl Reporter for NoopReporter {
    fn report_cluster_queue_status(&self, _cluster_queue: &str, _status: QueueStatus) {
    }

    fn report_admitted_active_workloads(&self, _cluster_queue: &str, _count: usize) {
    }
}
