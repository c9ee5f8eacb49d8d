//! Cache
//!
//! The `[Cache]` is the entry point for the synchronization layer. It owns all queues, cohorts
//! and the flavor registry, and routes each change event to the affected queues. It is not
//! synchronized internally: callers wrap it in a lock of their choice and hold that lock around
//! every mutation, and around every read that must be consistent with one.
//!
//! Cohort membership is kept on both sides, in `[ClusterQueue::cohort()]` and
//! `[Cohort::members()]`. Only the cache changes it, and always on both sides within the same
//! call.

use std::collections::BTreeMap;

use crate::cluster_queue::ClusterQueue;
use crate::cohort::Cohort;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::flavor::{FlavorRegistry, ResourceFlavor};
use crate::metrics::{Reporter, TracingReporter};
use crate::model::ClusterQueueSpec;
use crate::tenant::{TenantQueue, TenantQueueRef};
use crate::workload::WorkloadInfo;

/// In-memory state of all queues, cohorts and flavors.
pub struct Cache {
    config: Config,
    reporter: Box<dyn Reporter + Send + Sync>,
    flavors: FlavorRegistry,
    cluster_queues: BTreeMap<String, ClusterQueue>,
    cohorts: BTreeMap<String, Cohort>,
    // Queue tracking each admitted workload, by workload key.
    workload_queues: BTreeMap<String, String>,
    // Queue each tenant queue is registered with, by tenant queue key.
    tenant_queues: BTreeMap<String, String>,
}

impl Cache {
    /// Create an empty cache reporting through `[TracingReporter]`.
    pub fn new(config: Config) -> Self {
        Cache::with_reporter(config, Box::new(TracingReporter))
    }

    /// Create an empty cache with a custom reporter.
    pub fn with_reporter(config: Config, reporter: Box<dyn Reporter + Send + Sync>) -> Self {
        Cache {
            config: config,
            reporter: reporter,
            flavors: FlavorRegistry::new(),
            cluster_queues: BTreeMap::new(),
            cohorts: BTreeMap::new(),
            workload_queues: BTreeMap::new(),
            tenant_queues: BTreeMap::new(),
        }
    }

    /// Create or update a queue from its spec.
    ///
    /// Fails if the namespace selector is malformed, in which case the queue is left untouched
    /// (and not created, if it did not exist yet).
    pub fn add_or_update_cluster_queue(&mut self, name: &str, spec: &ClusterQueueSpec) -> Result<()> {
        let created = !self.cluster_queues.contains_key(name);
        let pods_ready_tracking = self.config.pods_ready_tracking;
        let cq = self.cluster_queues
            .entry(name.to_owned())
            .or_insert_with(|| ClusterQueue::new(name, pods_ready_tracking));

        if let Err(e) = cq.update(spec, &self.flavors) {
            tracing::warn!(cluster_queue = name, error = %e, "rejecting cluster queue spec");
            if created {
                self.cluster_queues.remove(name);
            }
            return Err(e);
        }
        let status = cq.status();

        // An empty cohort name means no cohort.
        let cohort = spec.cohort.as_deref().filter(|c| !c.is_empty());
        self.update_cohort(name, cohort);
        self.reporter.report_cluster_queue_status(name, status);
        tracing::info!(
            cluster_queue = name,
            created = created,
            status = status.as_str(),
            "cluster queue updated"
        );

        Ok(())
    }

    /// Delete a queue.
    ///
    /// The queue leaves its cohort, and its workloads are forgotten. Unknown queues are ignored.
    pub fn delete_cluster_queue(&mut self, name: &str) {
        if !self.cluster_queues.contains_key(name) {
            return;
        }

        self.remove_from_cohort(name);
        self.cluster_queues.remove(name);
        self.workload_queues.retain(|_, cq| cq.as_str() != name);
        self.tenant_queues.retain(|_, cq| cq.as_str() != name);
        tracing::info!(cluster_queue = name, "cluster queue deleted");
    }

    /// Mark a queue as terminating.
    ///
    /// The queue stays terminating until it is deleted.
    pub fn terminate_cluster_queue(&mut self, name: &str) {
        if let Some(cq) = self.cluster_queues.get_mut(name) {
            cq.terminate();
            self.reporter.report_cluster_queue_status(name, cq.status());
            tracing::info!(cluster_queue = name, "cluster queue terminating");
        }
    }

    // Move `name` into `cohort`, keeping both sides of the membership in sync.
    fn update_cohort(&mut self, name: &str, cohort: Option<&str>) {
        let current = self.cluster_queues
            .get(name)
            .and_then(|cq| cq.cohort().map(str::to_owned));
        if current.as_deref() == cohort {
            return;
        }

        self.remove_from_cohort(name);
        if let Some(cohort) = cohort {
            self.cohorts
                .entry(cohort.to_owned())
                .or_insert_with(|| Cohort::new(cohort))
                .insert(name);
        }
        if let Some(cq) = self.cluster_queues.get_mut(name) {
            cq.set_cohort(cohort.map(str::to_owned));
        }
        tracing::debug!(cluster_queue = name, cohort = ?cohort, "cohort membership changed");
    }

    // Remove `name` from the cohort it is a member of. Cohorts left empty are dropped.
    fn remove_from_cohort(&mut self, name: &str) {
        let cohort_name = match self.cluster_queues.get_mut(name).and_then(|cq| cq.take_cohort()) {
            Some(v) => v,
            None => return,
        };

        let emptied = match self.cohorts.get_mut(&cohort_name) {
            Some(cohort) => {
                cohort.remove(name);
                cohort.members().is_empty()
            }
            None => false,
        };
        if emptied {
            self.cohorts.remove(&cohort_name);
        }
    }

    /// Replace the flavor registry and reconcile every queue against it.
    pub fn reconcile_flavors(&mut self, flavors: FlavorRegistry) {
        self.flavors = flavors;
        self.update_with_flavors();
    }

    /// Register or update a single flavor.
    pub fn add_or_update_flavor(&mut self, flavor: ResourceFlavor) {
        self.flavors.insert(flavor.name.clone(), flavor);
        self.update_with_flavors();
    }

    /// Remove a single flavor from the registry.
    ///
    /// Queues still referencing the flavor become pending. Use `[Cache::is_flavor_in_use()]`
    /// to avoid that.
    pub fn delete_flavor(&mut self, name: &str) {
        if self.flavors.remove(name).is_some() {
            self.update_with_flavors();
        }
    }

    fn update_with_flavors(&mut self) {
        for (name, cq) in self.cluster_queues.iter_mut() {
            let status = cq.update_with_flavors(&self.flavors);
            self.reporter.report_cluster_queue_status(name, status);
        }
    }

    /// Check whether any queue lists `flavor` in one of its resource groups.
    pub fn is_flavor_in_use(&self, flavor: &str) -> bool {
        self.cluster_queues.values().any(|cq| cq.flavor_in_use(flavor))
    }

    /// Track an admitted workload in the queue that admitted it.
    ///
    /// Fails if the workload is already tracked by any queue. Workloads admitted by unknown
    /// queues are ignored.
    pub fn admit_workload(&mut self, wl: WorkloadInfo) -> Result<()> {
        let key = wl.key();
        let name = wl.cluster_queue.clone();

        if let Some(tracked) = self.workload_queues.get(&key) {
            return Err(Error::WorkloadExists {
                key: key,
                cluster_queue: tracked.clone(),
            });
        }

        let cq = match self.cluster_queues.get_mut(&name) {
            Some(v) => v,
            None => {
                tracing::debug!(workload = %key, cluster_queue = %name, "ignoring workload of unknown cluster queue");
                return Ok(());
            }
        };

        cq.add_workload(wl)?;
        self.reporter.report_admitted_active_workloads(&name, cq.workloads().len());
        tracing::debug!(workload = %key, cluster_queue = %name, "workload admitted");
        self.workload_queues.insert(key, name);

        Ok(())
    }

    /// Stop tracking a workload.
    ///
    /// Returns the removed workload. Unknown workloads are ignored.
    pub fn remove_workload(&mut self, key: &str) -> Option<WorkloadInfo> {
        let name = self.workload_queues.remove(key)?;
        let cq = self.cluster_queues.get_mut(&name)?;
        let wl = cq.delete_workload(key)?;

        self.reporter.report_admitted_active_workloads(&name, cq.workloads().len());
        tracing::debug!(workload = key, cluster_queue = %name, "workload removed");

        Some(wl)
    }

    /// Register a tenant queue with its queue.
    ///
    /// Fails if a tenant queue with the same key is registered already, with any queue. Tenant
    /// queues of unknown queues are ignored.
    pub fn register_tenant_queue(&mut self, q: &TenantQueueRef) -> Result<()> {
        let key = q.key();

        if let Some(tracked) = self.tenant_queues.get(&key) {
            return Err(Error::TenantQueueExists {
                key: key,
                cluster_queue: tracked.clone(),
            });
        }

        let cq = match self.cluster_queues.get_mut(&q.cluster_queue) {
            Some(v) => v,
            None => {
                tracing::debug!(queue = %key, cluster_queue = %q.cluster_queue, "ignoring tenant queue of unknown cluster queue");
                return Ok(());
            }
        };

        cq.add_tenant_queue(q)?;
        tracing::debug!(queue = %key, cluster_queue = %q.cluster_queue, "tenant queue registered");
        self.tenant_queues.insert(key, q.cluster_queue.clone());

        Ok(())
    }

    /// Deregister a tenant queue, by `<namespace>/<name>` key.
    ///
    /// Unknown tenant queues are ignored.
    pub fn deregister_tenant_queue(&mut self, key: &str) {
        let name = match self.tenant_queues.remove(key) {
            Some(v) => v,
            None => return,
        };

        if let Some(cq) = self.cluster_queues.get_mut(&name) {
            cq.delete_tenant_queue(key);
            tracing::debug!(queue = key, cluster_queue = %name, "tenant queue deregistered");
        }
    }

    /// Check whether a queue borrows quota from its cohort.
    pub fn is_borrowing(&self, cluster_queue: &str) -> bool {
        self.cluster_queues
            .get(cluster_queue)
            .map_or(false, ClusterQueue::is_borrowing)
    }

    /// Check whether any member of a cohort borrows quota.
    pub fn cohort_has_borrowing_queues(&self, cohort: &str) -> bool {
        self.cohorts
            .get(cohort)
            .map_or(false, |c| c.has_borrowing_queues(|name| self.cluster_queues.get(name)))
    }

    /// Configuration of the cache.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The flavor registry.
    pub fn flavors(&self) -> &FlavorRegistry {
        &self.flavors
    }

    /// A queue, by name.
    pub fn cluster_queue(&self, name: &str) -> Option<&ClusterQueue> {
        self.cluster_queues.get(name)
    }

    /// All queues, by name.
    pub fn cluster_queues(&self) -> &BTreeMap<String, ClusterQueue> {
        &self.cluster_queues
    }

    /// A cohort, by name.
    pub fn cohort(&self, name: &str) -> Option<&Cohort> {
        self.cohorts.get(name)
    }

    /// All cohorts, by name.
    pub fn cohorts(&self) -> &BTreeMap<String, Cohort> {
        &self.cohorts
    }

    /// A registered tenant queue, by `<namespace>/<name>` key.
    pub fn tenant_queue(&self, key: &str) -> Option<&TenantQueue> {
        let name = self.tenant_queues.get(key)?;
        self.cluster_queues.get(name)?.tenant_queue(key)
    }
}

impl Default for Cache {
    fn default() -> Self {
        Cache::new(Config::default())
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("config", &self.config)
            .field("flavors", &self.flavors)
            .field("cluster_queues", &self.cluster_queues)
            .field("cohorts", &self.cohorts)
            .finish()
    }
}
