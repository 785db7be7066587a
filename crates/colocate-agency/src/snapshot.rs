//! [`PlanSnapshot`]: the read-only input of the repair planner.

use std::collections::BTreeMap;

use colocate_placement::NaturalKey;
use colocate_types::{
    CollectionId, DatabaseId, HealthStatus, ServerId, ServerList, ShardId, ShardLink,
};
use serde_json::{Map, Value};
use tracing::debug;

use crate::collection::{Collection, ShardMap};
use crate::{AgencyError, paths};

type Result<T> = std::result::Result<T, AgencyError>;

/// Shard placement state read from one agency dump.
///
/// Built fresh for every planning run and never written back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanSnapshot {
    /// Planned database servers, ascending.
    servers: ServerList,
    /// Supervision health by server.
    health: BTreeMap<ServerId, HealthStatus>,
    /// Non-deleted collections of all databases, by ID.
    collections: BTreeMap<CollectionId, Collection>,
}

impl PlanSnapshot {
    /// Read a snapshot from the object that holds `Plan` and `Supervision`.
    pub fn from_agency(root: &Value) -> Result<Self> {
        let plan = object_at(root, "Plan", "Plan")?;
        let servers = read_servers(plan)?;
        let health = read_health(root)?;
        let collections = read_collections(plan)?;

        debug!(
            servers = servers.len(),
            healthy = health.values().filter(|h| h.is_healthy()).count(),
            collections = collections.len(),
            "read plan snapshot"
        );

        Ok(Self {
            servers,
            health,
            collections,
        })
    }

    /// Read a snapshot from a full agency read result.
    ///
    /// Accepts the response shape of an agency read, `[{"<prefix>": {...}}]`,
    /// as well as the bare `{"<prefix>": {...}}` object.
    pub fn from_agency_dump(dump: &Value, prefix: &str) -> Result<Self> {
        let top = match dump {
            Value::Array(items) => items.first().ok_or_else(|| AgencyError::MissingField {
                path: "[0]".to_string(),
            })?,
            other => other,
        };
        let root = top.get(prefix).ok_or_else(|| AgencyError::MissingField {
            path: prefix.to_string(),
        })?;
        Self::from_agency(root)
    }

    /// All planned database servers, ascending.
    pub fn servers(&self) -> &[ServerId] {
        &self.servers
    }

    /// Health of a server, if supervision reports one.
    pub fn health(&self, server: &ServerId) -> Option<HealthStatus> {
        self.health.get(server).copied()
    }

    /// Planned database servers whose health is `GOOD`, ascending.
    pub fn healthy_servers(&self) -> ServerList {
        self.servers
            .iter()
            .filter(|s| self.health(s).is_some_and(|h| h.is_healthy()))
            .cloned()
            .collect()
    }

    /// Look up a collection by ID.
    pub fn collection(&self, id: &CollectionId) -> Option<&Collection> {
        self.collections.get(id)
    }

    /// All non-deleted collections in ascending ID order.
    pub fn collections(&self) -> impl Iterator<Item = &Collection> {
        self.collections.values()
    }
}

// ---------------------------------------------------------------------------
// Readers
// ---------------------------------------------------------------------------

fn read_servers(plan: &Map<String, Value>) -> Result<ServerList> {
    let path = paths::PLAN_DB_SERVERS;
    let db_servers = object_at_map(plan, "DBServers", path)?;
    // serde_json maps are sorted, but do not rely on the feature set.
    let mut servers: ServerList = db_servers.keys().map(|k| ServerId::from(k.as_str())).collect();
    servers.sort();
    Ok(servers)
}

fn read_health(root: &Value) -> Result<BTreeMap<ServerId, HealthStatus>> {
    let Some(health) = root.get("Supervision").and_then(|s| s.get("Health")) else {
        return Ok(BTreeMap::new());
    };
    let health = as_object(health, paths::SUPERVISION_HEALTH)?;

    let mut result = BTreeMap::new();
    for (server, record) in health {
        let path = format!("{}/{server}", paths::SUPERVISION_HEALTH);
        let record = as_object(record, &path)?;
        let status = str_at(record, "Status", &format!("{path}/Status"))?;
        let status =
            HealthStatus::from_agency(status).ok_or_else(|| AgencyError::UnknownHealthStatus {
                server: server.clone(),
                status: status.to_string(),
            })?;
        result.insert(ServerId::from(server.as_str()), status);
    }
    Ok(result)
}

fn read_collections(plan: &Map<String, Value>) -> Result<BTreeMap<CollectionId, Collection>> {
    let by_database = object_at_map(plan, "Collections", paths::PLAN_COLLECTIONS)?;

    let mut result = BTreeMap::new();
    for (database, collections) in by_database {
        let db_path = format!("{}/{database}", paths::PLAN_COLLECTIONS);
        for (id, entry) in as_object(collections, &db_path)? {
            let path = format!("{db_path}/{id}");
            let collection = read_collection(DatabaseId::from(database.as_str()), id, entry, &path)?;

            if collection.deleted {
                debug!(collection = %collection.full_name(), "skipping deleted collection");
                continue;
            }

            if result.contains_key(&collection.id) {
                return Err(AgencyError::DuplicateCollection {
                    collection: id.clone(),
                });
            }
            result.insert(collection.id.clone(), collection);
        }
    }
    Ok(result)
}

fn read_collection(database: DatabaseId, id: &str, entry: &Value, path: &str) -> Result<Collection> {
    let entry = as_object(entry, path)?;

    let name = str_at(entry, "name", &format!("{path}/name"))?.to_string();
    let replication_factor = entry
        .get("replicationFactor")
        .ok_or_else(|| AgencyError::MissingField {
            path: format!("{path}/replicationFactor"),
        })?
        .as_u64()
        .ok_or_else(|| AgencyError::WrongType {
            path: format!("{path}/replicationFactor"),
            expected: "unsigned integer",
        })?;
    let deleted = match entry.get("deleted") {
        None | Some(Value::Null) => false,
        Some(value) => value.as_bool().ok_or_else(|| AgencyError::WrongType {
            path: format!("{path}/deleted"),
            expected: "bool",
        })?,
    };

    let linked = optional_str_at(entry, ShardLink::LINKED_ATTRIBUTE, path)?;
    let repairing = optional_str_at(entry, ShardLink::REPAIRING_ATTRIBUTE, path)?;
    let link = match (linked, repairing) {
        (None, None) => ShardLink::None,
        (Some(proto), None) => ShardLink::Linked(CollectionId::from(proto)),
        (None, Some(proto)) => ShardLink::Repairing(CollectionId::from(proto)),
        (Some(_), Some(_)) => {
            return Err(AgencyError::InconsistentAttributes {
                collection: id.to_string(),
            });
        }
    };

    let shards = if deleted {
        ShardMap::new()
    } else {
        read_shards(id, object_at_map(entry, "shards", &format!("{path}/shards"))?, path)?
    };

    Ok(Collection {
        database,
        name,
        id: CollectionId::from(id),
        replication_factor,
        deleted,
        link,
        shards,
    })
}

fn read_shards(collection: &str, shards: &Map<String, Value>, path: &str) -> Result<ShardMap> {
    let mut result = ShardMap::new();

    for (shard, servers) in shards {
        let shard_path = format!("{path}/shards/{shard}");
        let Value::Array(servers) = servers else {
            return Err(AgencyError::WrongType {
                path: shard_path,
                expected: "array of server ids",
            });
        };

        if servers.is_empty() {
            return Err(AgencyError::EmptyServerList {
                collection: collection.to_string(),
                shard: shard.clone(),
            });
        }

        let mut list = ServerList::with_capacity(servers.len());
        for server in servers {
            let server = server.as_str().ok_or_else(|| AgencyError::WrongType {
                path: shard_path.clone(),
                expected: "array of server ids",
            })?;
            let server = ServerId::from(server);
            if list.contains(&server) {
                return Err(AgencyError::DuplicateServer {
                    collection: collection.to_string(),
                    shard: shard.clone(),
                    server: server.to_string(),
                });
            }
            list.push(server);
        }

        result.insert(NaturalKey(ShardId::from(shard.as_str())), list);
    }

    Ok(result)
}

// ---------------------------------------------------------------------------
// JSON helpers
// ---------------------------------------------------------------------------

fn as_object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>> {
    value.as_object().ok_or_else(|| AgencyError::WrongType {
        path: path.to_string(),
        expected: "object",
    })
}

fn object_at<'a>(value: &'a Value, key: &str, path: &str) -> Result<&'a Map<String, Value>> {
    let map = as_object(value, "<root>")?;
    object_at_map(map, key, path)
}

fn object_at_map<'a>(
    map: &'a Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<&'a Map<String, Value>> {
    let value = map.get(key).ok_or_else(|| AgencyError::MissingField {
        path: path.to_string(),
    })?;
    as_object(value, path)
}

fn str_at<'a>(map: &'a Map<String, Value>, key: &str, path: &str) -> Result<&'a str> {
    map.get(key)
        .ok_or_else(|| AgencyError::MissingField {
            path: path.to_string(),
        })?
        .as_str()
        .ok_or_else(|| AgencyError::WrongType {
            path: path.to_string(),
            expected: "string",
        })
}

/// A string attribute that may be absent or `null`.
fn optional_str_at<'a>(
    map: &'a Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<Option<&'a str>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(AgencyError::WrongType {
            path: format!("{path}/{key}"),
            expected: "string",
        }),
    }
}
