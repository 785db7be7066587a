//! In-memory view of one `Plan/Collections/<database>/<id>` entry.

use std::collections::BTreeMap;

use colocate_placement::NaturalKey;
use colocate_types::{CollectionId, DatabaseId, ServerList, ShardId, ShardLink};
use serde_json::Value;

use crate::paths;

/// Shard ID → servers, iterated in natural shard order.
pub type ShardMap = BTreeMap<NaturalKey<ShardId>, ServerList>;

/// A collection as planned in the agency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    /// Database the collection belongs to.
    pub database: DatabaseId,
    /// Collection name.
    pub name: String,
    /// Cluster-wide collection ID.
    pub id: CollectionId,
    /// Number of servers each shard should live on.
    pub replication_factor: u64,
    /// Whether the collection is marked deleted in the plan.
    pub deleted: bool,
    /// Placement link to a prototype collection.
    pub link: ShardLink,
    /// Planned servers per shard.
    pub shards: ShardMap,
}

impl Collection {
    /// `<database>/<name>`, for log and error messages.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.database, self.name)
    }

    /// `Plan/Collections/<database>/<id>`.
    pub fn agency_path(&self) -> String {
        format!("{}/{}/{}", paths::PLAN_COLLECTIONS, self.database, self.id)
    }

    /// Path of a top-level attribute of this collection.
    pub fn attribute_path(&self, attribute: &str) -> String {
        format!("{}/{attribute}", self.agency_path())
    }

    /// Path of one shard's server list.
    pub fn shard_path(&self, shard: &ShardId) -> String {
        format!("{}/shards/{shard}", self.agency_path())
    }

    /// Number of shards.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Shard IDs in natural order.
    pub fn shard_ids(&self) -> impl Iterator<Item = &ShardId> {
        self.shards.keys().map(|key| &key.0)
    }

    /// Planned servers of a shard.
    pub fn shard_servers(&self, shard: &ShardId) -> Option<&ServerList> {
        self.shards.get(&NaturalKey(shard.clone()))
    }

    /// A shard's server list as the JSON array stored in the agency.
    pub fn shard_servers_json(&self, shard: &ShardId) -> Option<Value> {
        self.shard_servers(shard).map(servers_json)
    }
}

/// Render a server list as the JSON array stored in the agency.
pub fn servers_json(servers: &ServerList) -> Value {
    Value::Array(
        servers
            .iter()
            .map(|s| Value::String(s.as_str().to_string()))
            .collect(),
    )
}
