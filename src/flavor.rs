//! Resource Flavor Registry
//!
//! Flavors are registered cluster-wide, independently of the queues that reference them. Each
//! flavor advertises a set of node labels. Only the keys of those labels matter to this crate:
//! they make up the affinity label keys of the resource groups listing the flavor.

use std::collections::BTreeMap;

use crate::model::FlavorReference;

/// A registered resource flavor.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceFlavor {
    pub name: FlavorReference,
    #[serde(default)]
    pub node_labels: BTreeMap<String, String>,
}

/// The set of registered flavors, indexed by name.
pub type FlavorRegistry = BTreeMap<FlavorReference, ResourceFlavor>;

impl ResourceFlavor {
    /// Create a flavor advertising the given node labels.
    pub fn new<'a, L>(name: &str, node_labels: L) -> Self where
        L: IntoIterator<Item = (&'a str, &'a str)>,
    {
        ResourceFlavor {
            name: name.to_owned(),
            node_labels: node_labels
                .into_iter()
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect(),
        }
    }

    /// Iterate the affinity label keys advertised by this flavor.
    pub fn label_keys(&self) -> impl Iterator<Item = &str> {
        self.node_labels.keys().map(String::as_str)
    }
}

/// Build a registry from a list of flavors.
///
/// Later entries replace earlier ones of the same name.
pub fn registry<I>(flavors: I) -> FlavorRegistry where
    I: IntoIterator<Item = ResourceFlavor>,
{
    flavors.into_iter().map(|f| (f.name.clone(), f)).collect()
}
