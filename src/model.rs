//! Quota Model
//!
//! This module contains the data types that describe the quota of a queue. There are two sets of
//! types. The `*Spec` types describe the quota as it is configured, with quantities in spec units
//! (e.g., `"500m"` CPUs, `"4Gi"` memory). They can be deserialized with `serde`. The processed
//! types (`[ResourceGroup]`, `[FlavorQuotas]`, `[ResourceQuota]`) carry normalized integer
//! quantities and are what the rest of the crate operates on.

use std::collections::{BTreeMap, BTreeSet};

use crate::quantity::{self, Quantity};
use crate::selector::LabelSelector;

/// Name of a resource, e.g. `cpu` or `memory`.
pub type ResourceName = String;

/// Name of a resource flavor.
pub type FlavorReference = String;

/// Policy used by the preemption logic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Deserialize)]
pub enum PreemptionPolicy {
    Never,
    LowerPriority,
    LowerOrNewerEqualPriority,
    Any,
}

impl Default for PreemptionPolicy {
    fn default() -> Self {
        PreemptionPolicy::Never
    }
}

/// Preemption settings of a queue.
///
/// The two policies are independent. `reclaim_within_cohort` controls whether workloads of other
/// members of the cohort may be preempted to reclaim nominal quota, `within_cluster_queue`
/// controls preemption amongst workloads of the same queue.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preemption {
    #[serde(default)]
    pub reclaim_within_cohort: PreemptionPolicy,
    #[serde(default)]
    pub within_cluster_queue: PreemptionPolicy,
}

/// Configured quota of one resource in one flavor.
#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceQuotaSpec {
    pub name: ResourceName,
    pub nominal_quota: Quantity,
    #[serde(default)]
    pub borrowing_limit: Option<Quantity>,
}

/// Configured quotas of one flavor.
#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlavorQuotasSpec {
    pub name: FlavorReference,
    #[serde(default)]
    pub resources: Vec<ResourceQuotaSpec>,
}

/// Configured resource group.
#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroupSpec {
    pub covered_resources: Vec<ResourceName>,
    #[serde(default)]
    pub flavors: Vec<FlavorQuotasSpec>,
}

/// Configured quota of a queue.
///
/// A missing `namespace_selector` selects no namespace at all, an empty one selects every
/// namespace. A missing `preemption` uses `Never` for both policies.
#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterQueueSpec {
    #[serde(default)]
    pub cohort: Option<String>,
    #[serde(default)]
    pub resource_groups: Vec<ResourceGroupSpec>,
    #[serde(default)]
    pub namespace_selector: Option<LabelSelector>,
    #[serde(default)]
    pub preemption: Option<Preemption>,
}

/// Processed quota of one resource in one flavor.
///
/// Both values are in normalized units (see `[quantity::resource_value()]`). A missing
/// borrowing limit means the queue may borrow without bound from its cohort.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceQuota {
    pub nominal: i64,
    pub borrowing_limit: Option<i64>,
}

/// Processed quotas of one flavor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlavorQuotas {
    pub name: FlavorReference,
    pub resources: BTreeMap<ResourceName, ResourceQuota>,
}

/// Processed resource group.
///
/// The order of `flavors` is the preference order of flavor assignment and is kept verbatim from
/// the configured group. Flavors are neither reordered nor deduplicated.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceGroup {
    pub covered_resources: BTreeSet<ResourceName>,
    pub flavors: Vec<FlavorQuotas>,
    /// The set of node label keys advertised by the flavors of this group.
    ///
    /// Those keys define the affinity terms of a workload that can be matched against the
    /// flavors. Derived from the flavor registry, see `[crate::ClusterQueue::update_with_flavors()]`.
    pub label_keys: BTreeSet<String>,
}

impl ResourceQuota {
    fn from_spec(spec: &ResourceQuotaSpec) -> Self {
        ResourceQuota {
            nominal: quantity::resource_value(&spec.name, &spec.nominal_quota),
            borrowing_limit: spec.borrowing_limit
                .as_ref()
                .map(|limit| quantity::resource_value(&spec.name, limit)),
        }
    }
}

impl FlavorQuotas {
    fn from_spec(spec: &FlavorQuotasSpec) -> Self {
        FlavorQuotas {
            name: spec.name.clone(),
            resources: spec.resources
                .iter()
                .map(|r| (r.name.clone(), ResourceQuota::from_spec(r)))
                .collect(),
        }
    }
}

impl ResourceGroup {
    /// Process a configured resource group.
    ///
    /// Label keys start out empty, they are only derived when the queue is reconciled against
    /// the flavor registry.
    pub fn from_spec(spec: &ResourceGroupSpec) -> Self {
        ResourceGroup {
            covered_resources: spec.covered_resources.iter().cloned().collect(),
            flavors: spec.flavors.iter().map(FlavorQuotas::from_spec).collect(),
            label_keys: BTreeSet::new(),
        }
    }

    /// Check whether any flavor of the group is named `flavor`.
    pub fn has_flavor(&self, flavor: &str) -> bool {
        self.flavors.iter().any(|f| f.name == flavor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Quantities are normalized per resource and flavor order is preserved verbatim.
    #[test]
    fn process_resource_group() {
        let spec: ResourceGroupSpec = serde_json::from_value(serde_json::json!({
            "coveredResources": ["cpu", "memory"],
            "flavors": [
                {
                    "name": "spot",
                    "resources": [
                        { "name": "cpu", "nominalQuota": "1500m", "borrowingLimit": 2 },
                        { "name": "memory", "nominalQuota": "1Gi" }
                    ]
                },
                { "name": "on-demand", "resources": [ { "name": "cpu", "nominalQuota": "1" } ] },
                { "name": "spot", "resources": [] }
            ]
        })).unwrap();

        let rg = ResourceGroup::from_spec(&spec);

        let names: Vec<&str> = rg.flavors.iter().map(|f| f.name.as_str()).collect();
        assert_eq!{names, vec!["spot", "on-demand", "spot"]};
        assert_eq!{
            rg.flavors[0].resources["cpu"],
            ResourceQuota { nominal: 1500, borrowing_limit: Some(2000) }
        };
        assert_eq!{
            rg.flavors[0].resources["memory"],
            ResourceQuota { nominal: 1 << 30, borrowing_limit: None }
        };
        assert!{rg.label_keys.is_empty()};
        assert!{rg.has_flavor("on-demand")};
        assert!{!rg.has_flavor("reserved")};
    }

    #[test]
    fn default_preemption() {
        let spec: ClusterQueueSpec = serde_json::from_str("{}").unwrap();

        assert!{spec.preemption.is_none()};
        assert!{spec.namespace_selector.is_none()};
        assert_eq!{Preemption::default().reclaim_within_cohort, PreemptionPolicy::Never};
        assert_eq!{Preemption::default().within_cluster_queue, PreemptionPolicy::Never};

        let p: Preemption = serde_json::from_str(r#"{"withinClusterQueue": "LowerPriority"}"#).unwrap();
        assert_eq!{p.reclaim_within_cohort, PreemptionPolicy::Never};
        assert_eq!{p.within_cluster_queue, PreemptionPolicy::LowerPriority};
    }
}
