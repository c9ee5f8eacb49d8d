//! Flavor/resource usage counters.
//!
//! Usage of a queue is tracked per flavor and, within a flavor, per resource. Rather than
//! tracking a fixed array of counters, the set of slots is dynamic: it always mirrors the
//! flavor/resource pairs a queue currently declares in its resource groups. Slots that are not
//! declared do not exist, and accesses to them are reported as such rather than silently
//! creating a new slot.
//!
//! The `[Counter]` trait represents such a two-level resource counter. Each slot is represented
//! by the `[Scalar]` trait, which describes the numerical operations that are allowed on its
//! value. The only implementation provided is `[FlavorResourceQuantities]`.
//!
//! Charges and discharges saturate at the bounds of the scalar type. Commitments are themselves
//! saturated totals, so a ledger can legitimately be pushed past its range by a few large
//! workloads.

use std::collections::BTreeMap;

use crate::model::{FlavorReference, ResourceName};

/// Scalar resource counter
///
/// This trait is used to denote scalar values that count the usage of a single resource. It
/// usually is backed by a simple integer value, but that is not necessarily required. This trait
/// makes heavy use of the traits defined by the `num` crate to abstract over integer operations.
pub trait Scalar where
    Self: Clone +
          Ord +
          Sized +
          num::Zero +
          num::Bounded +
          num::CheckedAdd +
          num::CheckedSub +
          for<'a> num::traits::NumAssignOps<&'a Self>,
{
}

impl<T> Scalar for T where
    T: Clone +
       Ord +
       Sized +
       num::Zero +
       num::Bounded +
       num::CheckedAdd +
       num::CheckedSub +
       for<'a> num::traits::NumAssignOps<&'a Self>,
{
}

/// Two-level resource counter
///
/// This trait represents a set of resource counters indexed by flavor and resource name. Unlike
/// a plain map, looking up a slot never creates it. The set of slots is fixed at construction
/// and only changes when the counter is reshaped.
pub trait Counter {
    type Scalar: Scalar;

    /// Create new counter from a template.
    ///
    /// This takes an existing counter as a template and creates a new counter that has the same
    /// slots. The new counter is initialized to zero. That is, the template is only used to make
    /// sure both counters have the same flavor/resource pairs.
    fn from_template(template: &Self) -> Self;

    /// Dereference an individual slot on the counter.
    ///
    /// This returns a mutable reference to the slot of `resource` in `flavor`, or `None` if the
    /// counter has no such slot.
    fn slot(&mut self, flavor: &str, resource: &str) -> Option<&mut Self::Scalar>;

    /// Check whether the counter is empty.
    ///
    /// This checks all slots of the counter whether they are empty. If all are empty (that is,
    /// they are `0`, as in `num::Zero::is_zero()`), this will return `true`, otherwise `false` is
    /// returned. A counter without slots is empty.
    fn empty(&self) -> bool;
}

/// Usage ledger indexed by flavor, then resource.
///
/// This is the ledger shape shared by queues and tenant queues. Slots are created explicitly via
/// `[FlavorResourceQuantities::declare()]` or by reshaping against a template; charges against
/// slots that do not exist are dropped.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlavorResourceQuantities<S = i64> where
    S: Scalar,
{
    flavors: BTreeMap<FlavorReference, BTreeMap<ResourceName, S>>,
}

impl<S> FlavorResourceQuantities<S> where
    S: Scalar,
{
    /// Create a counter without any slots.
    pub fn new() -> Self {
        FlavorResourceQuantities {
            flavors: BTreeMap::new(),
        }
    }

    /// Declare a slot, zero-initialized.
    ///
    /// If the slot already exists, it is left unmodified.
    pub fn declare(&mut self, flavor: &str, resource: &str) {
        self.flavors
            .entry(flavor.to_owned())
            .or_insert_with(BTreeMap::new)
            .entry(resource.to_owned())
            .or_insert_with(num::Zero::zero);
    }

    /// Declare an empty flavor.
    ///
    /// Flavors without resources still count as a known flavor of the ledger.
    pub fn declare_flavor(&mut self, flavor: &str) {
        self.flavors
            .entry(flavor.to_owned())
            .or_insert_with(BTreeMap::new);
    }

    /// Reshape this counter to the slots of `template`.
    ///
    /// Every slot that exists in both counters keeps its value. Slots that only exist in `self`
    /// are dropped, slots that only exist in `template` are created with a value of zero. The
    /// values of `template` are never read.
    pub fn reshape<T>(&mut self, template: &FlavorResourceQuantities<T>) where
        T: Scalar,
    {
        let mut previous = std::mem::take(&mut self.flavors);
        for (flavor, resources) in &template.flavors {
            let mut kept = previous.remove(flavor).unwrap_or_default();
            let mut slots = BTreeMap::new();
            for resource in resources.keys() {
                let value = kept.remove(resource).unwrap_or_else(num::Zero::zero);
                slots.insert(resource.clone(), value);
            }
            self.flavors.insert(flavor.clone(), slots);
        }
    }

    /// Read a slot.
    pub fn get(&self, flavor: &str, resource: &str) -> Option<&S> {
        self.flavors.get(flavor).and_then(|r| r.get(resource))
    }

    /// Read all slots of a flavor.
    pub fn flavor(&self, flavor: &str) -> Option<&BTreeMap<ResourceName, S>> {
        self.flavors.get(flavor)
    }

    /// Check whether the counter has a slot for `resource` in `flavor`.
    pub fn contains(&self, flavor: &str, resource: &str) -> bool {
        self.get(flavor, resource).is_some()
    }

    /// Number of flavors known to this counter.
    pub fn len(&self) -> usize {
        self.flavors.len()
    }

    /// Check whether the counter has no flavors at all.
    ///
    /// Note that this is different from `[Counter::empty()]`, which checks whether all slots
    /// are zero.
    pub fn is_empty(&self) -> bool {
        self.flavors.is_empty()
    }

    /// Iterate all slots in flavor/resource order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &S)> {
        self.flavors.iter().flat_map(|(flavor, resources)| {
            resources
                .iter()
                .map(move |(resource, value)| (flavor.as_str(), resource.as_str(), value))
        })
    }

    /// Charge `amount` to a slot, saturating at the bounds of `S`.
    ///
    /// If the slot does not exist, nothing is charged and `false` is returned.
    pub fn charge(&mut self, flavor: &str, resource: &str, amount: &S) -> bool {
        match self.slot(flavor, resource) {
            Some(slot) => {
                *slot = num::CheckedAdd::checked_add(&*slot, amount)
                    .unwrap_or_else(|| saturated(amount, true));
                true
            }
            None => false,
        }
    }

    /// Discharge `amount` from a slot, saturating at the bounds of `S`.
    ///
    /// If the slot does not exist, nothing is discharged and `false` is returned.
    pub fn discharge(&mut self, flavor: &str, resource: &str, amount: &S) -> bool {
        match self.slot(flavor, resource) {
            Some(slot) => {
                *slot = num::CheckedSub::checked_sub(&*slot, amount)
                    .unwrap_or_else(|| saturated(amount, false));
                true
            }
            None => false,
        }
    }
}

// Bound an overflowing operation ends up at. Adding a positive amount or subtracting a negative
// one overflows upwards, everything else downwards.
fn saturated<S>(amount: &S, adding: bool) -> S where
    S: Scalar,
{
    if (*amount > S::zero()) == adding {
        S::max_value()
    } else {
        S::min_value()
    }
}

impl<S> Counter for FlavorResourceQuantities<S> where
    S: Scalar,
{
    type Scalar = S;

    fn from_template(template: &Self) -> Self {
        let mut v = FlavorResourceQuantities::new();
        v.reshape(template);
        v
    }

    fn slot(&mut self, flavor: &str, resource: &str) -> Option<&mut Self::Scalar> {
        self.flavors.get_mut(flavor).and_then(|r| r.get_mut(resource))
    }

    fn empty(&self) -> bool {
        for (_, _, slot) in self.iter() {
            if !num::Zero::is_zero(slot) {
                return false;
            }
        }

        true
    }
}
