//! Admitted Workloads
//!
//! Workloads are owned by the synchronization layer. This crate only keeps a read-only view of
//! each admitted workload: who submitted it, which queue admitted it, and which flavor was chosen
//! for every resource each of its pod sets requests.

use std::collections::BTreeMap;

use crate::model::{FlavorReference, ResourceName};

/// Resource commitment of one pod set.
///
/// `requests` holds the total over all pods of the set, `flavors` the flavor assigned to each
/// resource at admission. Requested resources without an assigned flavor are not accounted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PodSetResources {
    pub name: String,
    pub count: u32,
    pub requests: BTreeMap<ResourceName, i64>,
    pub flavors: BTreeMap<ResourceName, FlavorReference>,
}

/// View of an admitted workload.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorkloadInfo {
    pub namespace: String,
    pub name: String,
    /// Name of the tenant queue the workload was submitted to.
    pub queue_name: String,
    /// Name of the queue that admitted the workload.
    pub cluster_queue: String,
    /// Whether the pods of the workload report readiness.
    pub pods_ready: bool,
    pub pod_sets: Vec<PodSetResources>,
}

/// Build the key of a namespaced object.
pub fn key(namespace: &str, name: &str) -> String {
    format!("{}/{}", namespace, name)
}

impl PodSetResources {
    /// Create the commitment of `count` pods, each requesting `per_pod`.
    ///
    /// Totals saturate rather than overflow.
    pub fn new<'a, R>(name: &str, count: u32, per_pod: R) -> Self where
        R: IntoIterator<Item = (&'a str, i64)>,
    {
        PodSetResources {
            name: name.to_owned(),
            count: count,
            requests: per_pod
                .into_iter()
                .map(|(r, v)| (r.to_owned(), v.saturating_mul(i64::from(count))))
                .collect(),
            flavors: BTreeMap::new(),
        }
    }

    /// Record the flavor assigned to `resource`.
    pub fn assign(mut self, resource: &str, flavor: &str) -> Self {
        self.flavors.insert(resource.to_owned(), flavor.to_owned());
        self
    }

    /// Iterate the accounted `(flavor, resource, quantity)` triples.
    ///
    /// Only resources that are both requested and have a flavor assigned are yielded.
    pub fn assigned(&self) -> impl Iterator<Item = (&str, &str, i64)> {
        self.flavors.iter().filter_map(move |(resource, flavor)| {
            self.requests
                .get(resource)
                .map(|&v| (flavor.as_str(), resource.as_str(), v))
        })
    }
}

impl WorkloadInfo {
    /// Create the view of a workload with no pod sets.
    pub fn new(namespace: &str, name: &str, queue_name: &str, cluster_queue: &str) -> Self {
        WorkloadInfo {
            namespace: namespace.to_owned(),
            name: name.to_owned(),
            queue_name: queue_name.to_owned(),
            cluster_queue: cluster_queue.to_owned(),
            pods_ready: false,
            pod_sets: Vec::new(),
        }
    }

    /// Add a pod set.
    pub fn with_pod_set(mut self, pod_set: PodSetResources) -> Self {
        self.pod_sets.push(pod_set);
        self
    }

    /// Set the pod readiness of the workload.
    pub fn with_pods_ready(mut self, pods_ready: bool) -> Self {
        self.pods_ready = pods_ready;
        self
    }

    /// Stable identity of the workload.
    pub fn key(&self) -> String {
        key(&self.namespace, &self.name)
    }

    /// Key of the tenant queue the workload belongs to.
    pub fn queue_key(&self) -> String {
        key(&self.namespace, &self.queue_name)
    }
}
