//! Agency plan snapshot reader and write transactions.
//!
//! The agency is the cluster's strongly consistent configuration store. This
//! crate reads the parts of an agency dump that describe shard placement
//! (`Plan/DBServers`, `Plan/Collections`, `Supervision/Health`) into a
//! [`PlanSnapshot`], and models the conditioned multi-key writes
//! ([`AgencyWriteTransaction`]) that are sent back to it.
//!
//! Nothing here talks to a live agency; callers supply the dump and apply
//! the transactions.

mod collection;
mod error;
pub mod paths;
mod snapshot;
mod transaction;


pub use collection::{Collection, ShardMap, servers_json};
pub use error::AgencyError;
pub use snapshot::PlanSnapshot;
pub use transaction::{AgencyPrecondition, AgencyWrite, AgencyWriteTransaction, Condition, WriteOp};
