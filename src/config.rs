//! Cache Configuration

/// Settings of a `[crate::Cache]`.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Track admitted workloads whose pods are not ready yet.
    ///
    /// If enabled, every queue keeps the keys of admitted workloads that do not report pod
    /// readiness in `[crate::ClusterQueue::workloads_not_ready]`.
    #[serde(default)]
    pub pods_ready_tracking: bool,
}
