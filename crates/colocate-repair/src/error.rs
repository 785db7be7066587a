//! Error types for repair planning.

use colocate_agency::AgencyError;
use colocate_types::{CollectionId, ShardId};

/// Errors that can occur while planning a repair.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepairError {
    /// The snapshot is malformed; nothing can be planned from it.
    #[error("malformed plan snapshot: {0}")]
    Data(#[from] AgencyError),

    /// A collection and its prototype cannot be brought into line by moving
    /// shards. Needs an operator.
    #[error("structural error: {0}")]
    Structural(#[from] StructuralError),

    /// Not enough healthy servers to move a shard: the prototype places it
    /// on an unhealthy server, or no healthy server is free to act as a
    /// temporary hop.
    #[error(
        "not enough healthy servers to repair shard {shard} of {collection} ({healthy} healthy servers)"
    )]
    ResourceExhausted {
        /// Full name of the collection.
        collection: String,
        /// The shard that could not be moved.
        shard: ShardId,
        /// How many healthy servers the snapshot had.
        healthy: usize,
    },
}

/// Mismatches between a linked collection and its prototype that no
/// sequence of shard moves can fix.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructuralError {
    /// The prototype does not exist or is deleted.
    #[error("prototype {prototype} of collection {collection} does not exist")]
    MissingPrototype {
        /// Full name of the linked collection.
        collection: String,
        /// ID the link points to.
        prototype: CollectionId,
    },

    /// The collections have a different number of shards.
    #[error(
        "collection {collection} has {shards} shards but its prototype {prototype} has {prototype_shards}"
    )]
    MismatchingShardCount {
        /// Full name of the linked collection.
        collection: String,
        /// Full name of the prototype.
        prototype: String,
        /// Shards of the linked collection.
        shards: usize,
        /// Shards of the prototype.
        prototype_shards: usize,
    },

    /// The collections have a different replication factor.
    #[error(
        "collection {collection} has replication factor {replication_factor} but its prototype {prototype} has {prototype_replication_factor}"
    )]
    MismatchingReplicationFactor {
        /// Full name of the linked collection.
        collection: String,
        /// Full name of the prototype.
        prototype: String,
        /// Replication factor of the linked collection.
        replication_factor: u64,
        /// Replication factor of the prototype.
        prototype_replication_factor: u64,
    },

    /// A shard and its prototype shard are planned on a different number of servers.
    #[error(
        "shard {shard} of {collection} has {servers} servers but prototype shard {prototype_shard} has {prototype_servers}"
    )]
    MismatchingServerCount {
        /// Full name of the linked collection.
        collection: String,
        /// The linked shard.
        shard: ShardId,
        /// The prototype shard of the same rank.
        prototype_shard: ShardId,
        /// Servers of the linked shard.
        servers: usize,
        /// Servers of the prototype shard.
        prototype_servers: usize,
    },
}
