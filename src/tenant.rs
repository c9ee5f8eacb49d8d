//! Tenant Queues
//!
//! Tenants submit workloads through namespaced tenant queues, each of which feeds into exactly
//! one queue. A queue keeps a secondary ledger per registered tenant queue, scoped to the
//! workloads submitted through it. The ledger always has the shape of the queue's own ledger.

use crate::counter::{Counter, FlavorResourceQuantities};
use crate::workload;

/// Registration of a tenant queue.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantQueueRef {
    pub namespace: String,
    pub name: String,
    /// Name of the queue the tenant queue submits to.
    pub cluster_queue: String,
}

/// Accounting of a registered tenant queue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TenantQueue {
    key: String,
    pub(crate) admitted_workloads: usize,
    pub(crate) usage: FlavorResourceQuantities,
}

impl TenantQueueRef {
    /// Create a tenant queue registration.
    pub fn new(namespace: &str, name: &str, cluster_queue: &str) -> Self {
        TenantQueueRef {
            namespace: namespace.to_owned(),
            name: name.to_owned(),
            cluster_queue: cluster_queue.to_owned(),
        }
    }

    /// Key of the tenant queue, `<namespace>/<name>`.
    pub fn key(&self) -> String {
        workload::key(&self.namespace, &self.name)
    }
}

impl TenantQueue {
    // New tenant queue with a zeroed ledger shaped like `template`.
    pub(crate) fn new(key: String, template: &FlavorResourceQuantities) -> Self {
        TenantQueue {
            key: key,
            admitted_workloads: 0,
            usage: Counter::from_template(template),
        }
    }

    /// Key of the tenant queue, `<namespace>/<name>`.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Number of admitted workloads submitted through this tenant queue.
    pub fn admitted_workloads(&self) -> usize {
        self.admitted_workloads
    }

    /// Usage of the workloads submitted through this tenant queue.
    pub fn usage(&self) -> &FlavorResourceQuantities {
        &self.usage
    }

    // Reshape the ledger to the slots of the queue's ledger, keeping surviving values.
    pub(crate) fn reset_flavors_and_resources(&mut self, cq_usage: &FlavorResourceQuantities) {
        self.usage.reshape(cq_usage);
    }
}
