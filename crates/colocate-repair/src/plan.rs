//! [`RepairPlan`]: the result of one planning run.

use colocate_types::CollectionId;

use crate::{RepairError, RepairOperation};

/// The planned repair of one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionRepair {
    /// Collection ID.
    pub collection: CollectionId,
    /// `<database>/<name>`.
    pub full_name: String,
    /// The operations to apply in order, or why none could be planned.
    pub outcome: Result<Vec<RepairOperation>, RepairError>,
}

/// Repairs for every collection that needed one, in collection ID order.
///
/// Collections are planned independently: one collection's error never
/// removes another collection's operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairPlan {
    /// Per-collection results.
    pub collections: Vec<CollectionRepair>,
}

impl RepairPlan {
    /// All operations of successfully planned collections, in order.
    pub fn operations(&self) -> impl Iterator<Item = &RepairOperation> {
        self.collections
            .iter()
            .filter_map(|c| c.outcome.as_ref().ok())
            .flatten()
    }

    /// Consume the plan, keeping only the operations.
    pub fn into_operations(self) -> Vec<RepairOperation> {
        self.collections
            .into_iter()
            .filter_map(|c| c.outcome.ok())
            .flatten()
            .collect()
    }

    /// Collections that could not be planned, with the reason.
    pub fn errors(&self) -> impl Iterator<Item = (&CollectionRepair, &RepairError)> {
        self.collections
            .iter()
            .filter_map(|c| c.outcome.as_ref().err().map(|e| (c, e)))
    }

    /// The result for one collection, if it needed repair.
    pub fn for_collection(&self, id: &CollectionId) -> Option<&CollectionRepair> {
        self.collections.iter().find(|c| &c.collection == id)
    }

    /// Whether there is nothing to apply.
    pub fn is_empty(&self) -> bool {
        self.operations().next().is_none()
    }

    /// Whether any collection failed to plan.
    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }
}
