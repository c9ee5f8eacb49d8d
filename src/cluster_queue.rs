//! Cluster Queues
//!
//! A `[ClusterQueue]` is the in-memory view of a queue's quota and of the workloads it admitted.
//! It owns the usage ledger of the queue and the ledgers of all tenant queues registered with it,
//! and keeps them consistent across quota changes, flavor registry changes and workload events.
//!
//! None of the operations here block or fail on not-found conditions. Events from different
//! sources can arrive in any order, so charges against ledger slots that were removed by a quota
//! change are dropped, removing an unknown workload does nothing, and tenant queues registered
//! after their workloads were admitted are backfilled from the admitted workloads.

use std::collections::{BTreeMap, BTreeSet};

use crate::counter::FlavorResourceQuantities;
use crate::error::{Error, Result};
use crate::flavor::FlavorRegistry;
use crate::model::{ClusterQueueSpec, Preemption, ResourceGroup, ResourceName};
use crate::selector::Selector;
use crate::status::QueueStatus;
use crate::tenant::{TenantQueue, TenantQueueRef};
use crate::workload::WorkloadInfo;

/// In-memory state of a queue.
#[derive(Clone, Debug)]
pub struct ClusterQueue {
    name: String,
    cohort: Option<String>,
    resource_groups: Vec<ResourceGroup>,
    // Index into `resource_groups` for every covered resource.
    rg_by_resource: BTreeMap<ResourceName, usize>,
    usage: FlavorResourceQuantities,
    workloads: BTreeMap<String, WorkloadInfo>,
    workloads_not_ready: BTreeSet<String>,
    namespace_selector: Selector,
    preemption: Preemption,
    status: QueueStatus,

    // Keyed by `<namespace>/<name>` of the tenant queue.
    tenant_queues: BTreeMap<String, TenantQueue>,
    pods_ready_tracking: bool,
}

// Direction of a usage update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Delta {
    Charge,
    Discharge,
}

// Apply the commitment of `wl` to `usage`.
//
// Slots that do not exist in `usage` are skipped. This happens when the quota was changed while
// the workload was admitted, and is tolerated so that events can be applied in any order.
fn update_usage(wl: &WorkloadInfo, usage: &mut FlavorResourceQuantities, delta: Delta) {
    for ps in &wl.pod_sets {
        for (flavor, resource, v) in ps.assigned() {
            let applied = match delta {
                Delta::Charge => usage.charge(flavor, resource, &v),
                Delta::Discharge => usage.discharge(flavor, resource, &v),
            };
            if !applied {
                tracing::trace!(
                    workload = %wl.key(),
                    flavor = flavor,
                    resource = resource,
                    "skipping usage of undeclared flavor resource"
                );
            }
        }
    }
}

// Build a zeroed ledger with one slot per flavor/resource pair declared in `groups`.
fn declared_usage(groups: &[ResourceGroup]) -> FlavorResourceQuantities {
    let mut usage = FlavorResourceQuantities::new();
    for rg in groups {
        for f in &rg.flavors {
            usage.declare_flavor(&f.name);
            for resource in f.resources.keys() {
                usage.declare(&f.name, resource);
            }
        }
    }
    usage
}

impl ClusterQueue {
    /// Create a queue without quota.
    ///
    /// The queue starts out `Pending` and must be configured via `[ClusterQueue::update()]`.
    pub fn new(name: &str, pods_ready_tracking: bool) -> Self {
        ClusterQueue {
            name: name.to_owned(),
            cohort: None,
            resource_groups: Vec::new(),
            rg_by_resource: BTreeMap::new(),
            usage: FlavorResourceQuantities::new(),
            workloads: BTreeMap::new(),
            workloads_not_ready: BTreeSet::new(),
            namespace_selector: Selector::nothing(),
            preemption: Preemption::default(),
            status: QueueStatus::Pending,
            tenant_queues: BTreeMap::new(),
            pods_ready_tracking: pods_ready_tracking,
        }
    }

    /// Apply a new quota spec.
    ///
    /// Resource groups are replaced as a whole. Usage is carried forward for every
    /// flavor/resource pair that is declared both before and after the update; other pairs are
    /// dropped or start at zero. The queue is then reconciled against `flavors`.
    ///
    /// The namespace selector is validated first. If it is malformed, an error is returned and
    /// the queue is left unmodified.
    ///
    /// The cohort named in `spec` is not applied here; membership is managed by the cache.
    pub fn update(&mut self, spec: &ClusterQueueSpec, flavors: &FlavorRegistry) -> Result<()> {
        let namespace_selector = Selector::parse(spec.namespace_selector.as_ref())?;

        self.update_resource_groups(spec.resource_groups.iter().map(ResourceGroup::from_spec).collect());
        self.namespace_selector = namespace_selector;
        self.preemption = spec.preemption.unwrap_or_default();
        self.update_with_flavors(flavors);

        Ok(())
    }

    /// Replace the resource groups.
    ///
    /// This rebuilds the resource-to-group index, reshapes the usage ledgers of the queue and of
    /// all tenant queues, and clears label keys until the next reconciliation.
    pub fn update_resource_groups(&mut self, groups: Vec<ResourceGroup>) {
        self.resource_groups = groups;
        self.update_rg_by_resource();

        self.usage.reshape(&declared_usage(&self.resource_groups));
        for q in self.tenant_queues.values_mut() {
            q.reset_flavors_and_resources(&self.usage);
        }
    }

    fn update_rg_by_resource(&mut self) {
        self.rg_by_resource = BTreeMap::new();
        for (i, rg) in self.resource_groups.iter().enumerate() {
            for resource in &rg.covered_resources {
                self.rg_by_resource.insert(resource.clone(), i);
            }
        }
    }

    /// Reconcile the queue against the registered flavors.
    ///
    /// This recomputes the label keys of every resource group and the status of the queue. The
    /// queue is `Pending` if any referenced flavor is not registered, `Active` otherwise, unless
    /// it is `Terminating`. The resulting status is returned.
    pub fn update_with_flavors(&mut self, flavors: &FlavorRegistry) -> QueueStatus {
        let flavor_not_found = self.update_label_keys(flavors);
        let status = self.status.transition(!flavor_not_found);

        if status != self.status {
            tracing::debug!(
                cluster_queue = %self.name,
                from = self.status.as_str(),
                to = status.as_str(),
                "cluster queue status changed"
            );
        }
        self.status = status;

        status
    }

    // Recompute label keys and return whether any referenced flavor is missing.
    fn update_label_keys(&mut self, flavors: &FlavorRegistry) -> bool {
        let mut flavor_not_found = false;

        for rg in &mut self.resource_groups {
            let mut keys = BTreeSet::new();
            for f in &rg.flavors {
                match flavors.get(&f.name) {
                    Some(flv) => keys.extend(flv.label_keys().map(str::to_owned)),
                    None => flavor_not_found = true,
                }
            }
            rg.label_keys = keys;
        }

        flavor_not_found
    }

    /// Track an admitted workload.
    ///
    /// Fails if a workload with the same key is already tracked, in which case nothing is
    /// modified. Otherwise the commitment of the workload is charged to the queue and, if its
    /// tenant queue is registered, to the tenant queue.
    pub fn add_workload(&mut self, wl: WorkloadInfo) -> Result<()> {
        let key = wl.key();
        if self.workloads.contains_key(&key) {
            return Err(Error::WorkloadExists {
                key: key,
                cluster_queue: self.name.clone(),
            });
        }

        self.update_workload_usage(&wl, Delta::Charge);
        if self.pods_ready_tracking && !wl.pods_ready {
            self.workloads_not_ready.insert(key.clone());
        }
        self.workloads.insert(key, wl);

        Ok(())
    }

    /// Stop tracking a workload.
    ///
    /// This reverses `[ClusterQueue::add_workload()]` and returns the removed workload. Unknown
    /// keys are ignored.
    pub fn delete_workload(&mut self, key: &str) -> Option<WorkloadInfo> {
        let wl = self.workloads.remove(key)?;

        self.update_workload_usage(&wl, Delta::Discharge);
        self.workloads_not_ready.remove(key);

        Some(wl)
    }

    // Update the usage of the queue and of the workload's tenant queue, if registered.
    fn update_workload_usage(&mut self, wl: &WorkloadInfo, delta: Delta) {
        update_usage(wl, &mut self.usage, delta);

        if let Some(q) = self.tenant_queues.get_mut(&wl.queue_key()) {
            update_usage(wl, &mut q.usage, delta);
            match delta {
                Delta::Charge => q.admitted_workloads += 1,
                Delta::Discharge => q.admitted_workloads = q.admitted_workloads.saturating_sub(1),
            }
        }
    }

    /// Register a tenant queue.
    ///
    /// Fails if a tenant queue with the same key is registered already. The ledger of the new
    /// tenant queue is backfilled from all currently admitted workloads submitted through it,
    /// since those may have been admitted before the registration arrived.
    pub fn add_tenant_queue(&mut self, q: &TenantQueueRef) -> Result<()> {
        let key = q.key();
        if self.tenant_queues.contains_key(&key) {
            return Err(Error::TenantQueueExists {
                key: key,
                cluster_queue: self.name.clone(),
            });
        }

        let mut tq = TenantQueue::new(key.clone(), &self.usage);
        for wl in self.workloads.values() {
            if wl.namespace == q.namespace && wl.queue_name == q.name {
                update_usage(wl, &mut tq.usage, Delta::Charge);
                tq.admitted_workloads += 1;
            }
        }
        self.tenant_queues.insert(key, tq);

        Ok(())
    }

    /// Deregister a tenant queue, dropping its ledger.
    ///
    /// Returns whether the tenant queue was registered.
    pub fn delete_tenant_queue(&mut self, key: &str) -> bool {
        self.tenant_queues.remove(key).is_some()
    }

    /// Check whether any resource group lists `flavor`.
    pub fn flavor_in_use(&self, flavor: &str) -> bool {
        self.resource_groups.iter().any(|rg| rg.has_flavor(flavor))
    }

    /// Check whether the queue uses more than its nominal quota of any flavor resource.
    ///
    /// A queue outside of a cohort never borrows.
    pub fn is_borrowing(&self) -> bool {
        if self.cohort.is_none() || self.usage.is_empty() {
            return false;
        }

        for rg in &self.resource_groups {
            for f in &rg.flavors {
                if let Some(used) = self.usage.flavor(&f.name) {
                    for (resource, quota) in &f.resources {
                        if used.get(resource).map_or(false, |&v| v > quota.nominal) {
                            return true;
                        }
                    }
                }
            }
        }

        false
    }

    /// Mark the queue as terminating.
    ///
    /// This is final; reconciliation never moves the queue out of this state.
    pub fn terminate(&mut self) {
        self.status = QueueStatus::Terminating;
    }

    /// Check whether the queue is active.
    pub fn active(&self) -> bool {
        self.status == QueueStatus::Active
    }

    /// Check whether a namespace with the given labels may submit to this queue.
    pub fn admits_namespace(&self, labels: &BTreeMap<String, String>) -> bool {
        self.namespace_selector.matches(labels)
    }

    pub(crate) fn set_cohort(&mut self, cohort: Option<String>) {
        self.cohort = cohort;
    }

    pub(crate) fn take_cohort(&mut self) -> Option<String> {
        self.cohort.take()
    }

    /// Name of the queue.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the cohort the queue is a member of, if any.
    pub fn cohort(&self) -> Option<&str> {
        self.cohort.as_deref()
    }

    /// Resource groups, in spec order.
    pub fn resource_groups(&self) -> &[ResourceGroup] {
        &self.resource_groups
    }

    /// The resource group covering `resource`, if any.
    pub fn resource_group_for(&self, resource: &str) -> Option<&ResourceGroup> {
        self.rg_by_resource
            .get(resource)
            .and_then(|&i| self.resource_groups.get(i))
    }

    /// Usage ledger of the queue.
    pub fn usage(&self) -> &FlavorResourceQuantities {
        &self.usage
    }

    /// Admitted workloads, by key.
    pub fn workloads(&self) -> &BTreeMap<String, WorkloadInfo> {
        &self.workloads
    }

    /// Keys of admitted workloads whose pods are not ready yet.
    ///
    /// Always empty unless pod readiness is tracked.
    pub fn workloads_not_ready(&self) -> &BTreeSet<String> {
        &self.workloads_not_ready
    }

    /// The namespace selector of the queue.
    pub fn namespace_selector(&self) -> &Selector {
        &self.namespace_selector
    }

    /// Preemption settings of the queue.
    pub fn preemption(&self) -> Preemption {
        self.preemption
    }

    /// Status of the queue.
    pub fn status(&self) -> QueueStatus {
        self.status
    }

    /// A registered tenant queue.
    pub fn tenant_queue(&self, key: &str) -> Option<&TenantQueue> {
        self.tenant_queues.get(key)
    }

    /// All registered tenant queues, by key.
    pub fn tenant_queues(&self) -> &BTreeMap<String, TenantQueue> {
        &self.tenant_queues
    }
}
