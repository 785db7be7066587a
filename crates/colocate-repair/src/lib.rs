//! Repair planning for `distributeShardsLike` collections.
//!
//! A collection created with `distributeShardsLike` must keep each of its
//! shards on exactly the servers (and in the same leader/follower order) as
//! the corresponding shard of its prototype. Failovers and rebalancing can
//! break that. This crate computes the operations that restore it:
//!
//! - [`DistributeShardsLikeRepairer`]: inspects a [`PlanSnapshot`] and builds a
//!   [`RepairPlan`], collection by collection.
//! - [`RepairOperation`]: either a [`MoveShardOperation`] for the supervision
//!   job queue or an [`AgencyWriteTransaction`] with preconditions.
//! - [`RepairError`]: why a collection (or the whole snapshot) could not be
//!   planned.
//!
//! Planning is a pure function of the snapshot. Applying the plan, and
//! deciding when to plan again, is up to the caller.
//!
//! [`PlanSnapshot`]: colocate_agency::PlanSnapshot
//! [`AgencyWriteTransaction`]: colocate_agency::AgencyWriteTransaction

pub mod error;
pub mod operation;
pub mod plan;
pub mod repairer;

pub use error::{RepairError, StructuralError};
pub use operation::{MoveShardOperation, RepairOperation};
pub use plan::{CollectionRepair, RepairPlan};
pub use repairer::{DistributeShardsLikeRepairer, plan_from_agency, repair_distribute_shards_like};
