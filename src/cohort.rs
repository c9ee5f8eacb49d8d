//! Cohorts
//!
//! A cohort is a set of queues that may borrow unused quota from each other. Membership is
//! recorded on both sides: every queue names its cohort, and every cohort lists its members by
//! name. Both sides are only ever changed together, by the `[crate::Cache]`.

use std::collections::BTreeSet;

use crate::cluster_queue::ClusterQueue;
use crate::counter::FlavorResourceQuantities;

/// A set of queues sharing quota.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Cohort {
    name: String,
    members: BTreeSet<String>,

    // The following fields are only populated in snapshots. They are never maintained by the
    // cache.
    pub requestable_resources: FlavorResourceQuantities,
    pub usage: FlavorResourceQuantities,
}

impl Cohort {
    pub(crate) fn new(name: &str) -> Self {
        Cohort {
            name: name.to_owned(),
            members: BTreeSet::new(),
            requestable_resources: FlavorResourceQuantities::new(),
            usage: FlavorResourceQuantities::new(),
        }
    }

    /// Name of the cohort.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names of the member queues.
    pub fn members(&self) -> &BTreeSet<String> {
        &self.members
    }

    pub(crate) fn insert(&mut self, cluster_queue: &str) {
        self.members.insert(cluster_queue.to_owned());
    }

    pub(crate) fn remove(&mut self, cluster_queue: &str) {
        self.members.remove(cluster_queue);
    }

    /// Check whether any member queue borrows quota.
    ///
    /// Members are resolved through `lookup`; names it cannot resolve are skipped.
    pub fn has_borrowing_queues<'a, F>(&self, lookup: F) -> bool where
        F: Fn(&str) -> Option<&'a ClusterQueue>,
    {
        self.members
            .iter()
            .filter_map(|name| lookup(name.as_str()))
            .any(ClusterQueue::is_borrowing)
    }
}
