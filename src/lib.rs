//! Resource Accounting Core for Multi-Tenant Job Admission
//!
//! This project provides the in-memory resource accounting of a job-admission cache. Tenants
//! submit workloads through namespaced tenant queues, which feed into cluster-scoped queues.
//! Every queue is configured with a list of resource groups, each of which covers a set of
//! resources and lists, in order of preference, the resource flavors that can satisfy them,
//! along with a nominal quota and an optional borrowing limit for every flavor resource. Queues
//! can be grouped into cohorts, whose members may borrow unused quota from each other.
//!
//! The central object is the `[Cache]`. The synchronization layer feeds it every change event:
//! queue specs created or updated, flavors registered or removed, workloads admitted or
//! finished, and tenant queues registered or removed. From these, the cache maintains for every
//! queue how much of each flavor resource is committed to admitted workloads, whether the queue
//! is usable at all (that is, whether all flavors it references exist), and which node label
//! keys matter when choosing a flavor of a resource group. The admission and preemption logic
//! read this state between events, but never decide anything through this crate.
//!
//! Events arrive on independent streams and in no particular order relative to each other.
//! Every operation is therefore tolerant of reordering: registering something twice is
//! rejected, removing something unknown does nothing, and usage charged against a flavor
//! resource that a quota update removed in the meantime is silently dropped. As a consequence,
//! usage can transiently under-count after a quota shrink.
//!
//! The cache is not synchronized internally. None of the operations block or perform I/O, so
//! the caller is expected to hold a single lock around every mutation and every read that must
//! be consistent with one.

pub mod cache;
pub mod cluster_queue;
pub mod cohort;
pub mod config;
pub mod counter;
pub mod error;
pub mod flavor;
pub mod metrics;
pub mod model;
pub mod quantity;
pub mod selector;
pub mod status;
pub mod tenant;
pub mod workload;

pub use cache::Cache;
pub use cluster_queue::ClusterQueue;
pub use cohort::Cohort;
pub use config::Config;
pub use counter::{Counter, FlavorResourceQuantities, Scalar};
pub use error::{Error, Result};
pub use flavor::{FlavorRegistry, ResourceFlavor};
pub use metrics::{NoopReporter, Reporter, TracingReporter};
pub use model::{
    ClusterQueueSpec,
    FlavorQuotas,
    FlavorQuotasSpec,
    FlavorReference,
    Preemption,
    PreemptionPolicy,
    ResourceGroup,
    ResourceGroupSpec,
    ResourceName,
    ResourceQuota,
    ResourceQuotaSpec,
};
pub use quantity::Quantity;
pub use selector::{LabelSelector, LabelSelectorRequirement, Selector};
pub use status::QueueStatus;
pub use tenant::{TenantQueue, TenantQueueRef};
pub use workload::{PodSetResources, WorkloadInfo};
