//! The operations a repair plan consists of.

use std::fmt;

use colocate_agency::{AgencyWriteTransaction, paths};
use colocate_types::{CollectionId, DatabaseId, ServerId, ShardId};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// A request to the supervision job queue to move one replica of a shard.
///
/// Moving the leader hands leadership to `to` and drops `from`; moving a
/// follower replaces `from` with `to` at the same position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveShardOperation {
    /// Database of the collection.
    pub database: DatabaseId,
    /// Collection ID.
    pub collection: CollectionId,
    /// The shard to move.
    pub shard: ShardId,
    /// Server giving up its replica.
    #[serde(rename = "fromServer")]
    pub from: ServerId,
    /// Server receiving the replica.
    #[serde(rename = "toServer")]
    pub to: ServerId,
    /// Whether the leader replica is being moved.
    pub is_leader: bool,
}

impl MoveShardOperation {
    /// The job document to write under [`paths::todo_path`].
    pub fn to_todo(&self, job_id: u64, creator: &str) -> Value {
        json!({
            "type": "moveShard",
            "database": self.database,
            "collection": self.collection,
            "shard": self.shard,
            "fromServer": self.from,
            "toServer": self.to,
            "isLeader": self.is_leader,
            "jobId": job_id.to_string(),
            "creator": creator,
        })
    }

    /// Agency path the job document is written to.
    pub fn todo_path(job_id: u64) -> String {
        paths::todo_path(job_id)
    }
}

impl fmt::Display for MoveShardOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MoveShardOperation({}/{} shard {}: {} -> {}, {})",
            self.database,
            self.collection,
            self.shard,
            self.from,
            self.to,
            if self.is_leader { "leader" } else { "follower" }
        )
    }
}

/// One step of a repair plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairOperation {
    /// Relocate a replica through the job queue.
    MoveShard(MoveShardOperation),
    /// Change the plan directly with a preconditioned write.
    AgencyTransaction(AgencyWriteTransaction),
}

impl RepairOperation {
    /// The move, if this is one.
    pub fn as_move_shard(&self) -> Option<&MoveShardOperation> {
        match self {
            Self::MoveShard(op) => Some(op),
            Self::AgencyTransaction(_) => None,
        }
    }

    /// The transaction, if this is one.
    pub fn as_transaction(&self) -> Option<&AgencyWriteTransaction> {
        match self {
            Self::MoveShard(_) => None,
            Self::AgencyTransaction(trx) => Some(trx),
        }
    }
}

impl From<MoveShardOperation> for RepairOperation {
    fn from(op: MoveShardOperation) -> Self {
        Self::MoveShard(op)
    }
}

impl From<AgencyWriteTransaction> for RepairOperation {
    fn from(trx: AgencyWriteTransaction) -> Self {
        Self::AgencyTransaction(trx)
    }
}

impl fmt::Display for RepairOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MoveShard(op) => op.fmt(f),
            Self::AgencyTransaction(trx) => trx.fmt(f),
        }
    }
}
