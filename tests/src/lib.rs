//! Shared test harness for colocate integration tests.
//!
//! Provides [`SimAgency`], an in-memory agency tree that repair plans can be
//! applied to. Move jobs take effect immediately, and transactions check
//! their preconditions exactly as the agency would. Tests plan against
//! [`SimAgency::snapshot`], apply some or all of the plan, and plan again.

use std::collections::BTreeMap;
use std::fmt;

use colocate_agency::{AgencyWriteTransaction, Condition, PlanSnapshot, WriteOp};
use colocate_placement::NaturalKey;
use colocate_repair::{
    MoveShardOperation, RepairOperation, RepairPlan, repair_distribute_shards_like,
};
use colocate_types::ShardLink;
use serde_json::{Map, Value, json};

/// Database all builder collections live in.
pub const DATABASE: &str = "db";

// =========================================================================
// Errors
// =========================================================================

/// Why an operation was rejected by the simulated agency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// A transaction precondition did not hold.
    PreconditionFailed(String),
    /// A move named a shard or server that is not where it claims.
    BadMove(String),
}

impl fmt::Display for ApplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PreconditionFailed(path) => write!(f, "precondition failed on {path}"),
            Self::BadMove(reason) => write!(f, "bad move: {reason}"),
        }
    }
}

impl std::error::Error for ApplyError {}

// =========================================================================
// Builder
// =========================================================================

/// Fluent builder for the agency tree of a single-database cluster.
#[derive(Debug, Default)]
pub struct ClusterBuilder {
    health: BTreeMap<String, String>,
    collections: Map<String, Value>,
}

impl ClusterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add healthy database servers.
    pub fn servers(mut self, ids: &[&str]) -> Self {
        for id in ids {
            self.health.insert(id.to_string(), "GOOD".to_string());
        }
        self
    }

    /// Set a server's supervision status (`GOOD`, `BAD`, `FAILED`).
    pub fn health(mut self, id: &str, status: &str) -> Self {
        self.health.insert(id.to_string(), status.to_string());
        self
    }

    /// Add an unlinked collection.
    pub fn prototype(self, id: &str, name: &str, shards: &[(&str, &[&str])]) -> Self {
        self.collection(id, name, None, shards)
    }

    /// Add a collection with `distributeShardsLike` pointing at `proto`.
    pub fn linked(self, id: &str, name: &str, proto: &str, shards: &[(&str, &[&str])]) -> Self {
        self.collection(id, name, Some((ShardLink::LINKED_ATTRIBUTE, proto)), shards)
    }

    /// Add a collection left behind by an interrupted repair.
    pub fn repairing(self, id: &str, name: &str, proto: &str, shards: &[(&str, &[&str])]) -> Self {
        self.collection(id, name, Some((ShardLink::REPAIRING_ATTRIBUTE, proto)), shards)
    }

    /// Add an arbitrary collection entry.
    pub fn raw_collection(mut self, id: &str, entry: Value) -> Self {
        self.collections.insert(id.to_string(), entry);
        self
    }

    fn collection(
        mut self,
        id: &str,
        name: &str,
        link: Option<(&str, &str)>,
        shards: &[(&str, &[&str])],
    ) -> Self {
        let replication_factor = shards.first().map_or(1, |(_, servers)| servers.len());
        let shards: Map<String, Value> = shards
            .iter()
            .map(|(shard, servers)| (shard.to_string(), json!(servers)))
            .collect();

        let mut entry = json!({
            "name": name,
            "replicationFactor": replication_factor,
            "shards": shards,
        });
        if let (Some((attribute, proto)), Some(map)) = (link, entry.as_object_mut()) {
            map.insert(attribute.to_string(), json!(proto));
        }

        self.collections.insert(id.to_string(), entry);
        self
    }

    pub fn build(self) -> SimAgency {
        let db_servers: Map<String, Value> = self
            .health
            .keys()
            .map(|id| (id.clone(), json!("none")))
            .collect();
        let health: Map<String, Value> = self
            .health
            .iter()
            .map(|(id, status)| (id.clone(), json!({ "Status": status })))
            .collect();

        SimAgency {
            root: json!({
                "Plan": {
                    "Version": 1,
                    "DBServers": db_servers,
                    "Collections": { DATABASE: self.collections },
                },
                "Supervision": { "Health": health },
            }),
            applied: 0,
        }
    }
}

// =========================================================================
// Simulated agency
// =========================================================================

/// An in-memory agency tree.
#[derive(Debug, Clone)]
pub struct SimAgency {
    root: Value,
    applied: usize,
}

impl SimAgency {
    /// The tree under the agency prefix.
    pub fn root(&self) -> &Value {
        &self.root
    }

    /// The tree wrapped the way an agency read returns it.
    pub fn dump(&self, prefix: &str) -> Value {
        json!([{ prefix: self.root.clone() }])
    }

    /// Parse the current tree.
    pub fn snapshot(&self) -> PlanSnapshot {
        PlanSnapshot::from_agency(&self.root).expect("simulated agency holds a valid plan")
    }

    /// Plan repairs for the current tree.
    pub fn plan(&self) -> RepairPlan {
        repair_distribute_shards_like(&self.snapshot())
    }

    /// Number of operations applied so far.
    pub fn applied(&self) -> usize {
        self.applied
    }

    /// `Plan/Version`.
    pub fn plan_version(&self) -> u64 {
        self.get("Plan/Version").and_then(Value::as_u64).unwrap_or(0)
    }

    /// Mark a server's supervision status.
    pub fn set_health(&mut self, server: &str, status: &str) {
        self.set(
            &format!("Supervision/Health/{server}/Status"),
            json!(status),
        );
    }

    /// Overwrite one shard's server list.
    pub fn set_shard(&mut self, collection: &str, shard: &str, servers: &[&str]) {
        self.set(&shard_path(collection, shard), json!(servers));
    }

    /// A shard's server list.
    pub fn shard(&self, collection: &str, shard: &str) -> Vec<String> {
        self.get(&shard_path(collection, shard))
            .and_then(Value::as_array)
            .map(|servers| {
                servers
                    .iter()
                    .filter_map(|s| s.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// A collection's server lists, in natural shard order.
    pub fn shard_lists(&self, collection: &str) -> Vec<Vec<String>> {
        let Some(shards) = self
            .get(&format!("{}/shards", collection_path(collection)))
            .and_then(Value::as_object)
        else {
            return Vec::new();
        };
        let mut ids: Vec<NaturalKey<&str>> =
            shards.keys().map(|k| NaturalKey(k.as_str())).collect();
        ids.sort();
        ids.into_iter()
            .map(|id| self.shard(collection, id.0))
            .collect()
    }

    /// A collection attribute, if set.
    pub fn attribute(&self, collection: &str, attribute: &str) -> Option<&Value> {
        self.get(&format!("{}/{attribute}", collection_path(collection)))
    }

    /// Whether `collection` is linked to `proto` and placed exactly like it.
    pub fn is_consistent(&self, collection: &str, proto: &str) -> bool {
        self.attribute(collection, ShardLink::LINKED_ATTRIBUTE) == Some(&json!(proto))
            && self
                .attribute(collection, ShardLink::REPAIRING_ATTRIBUTE)
                .is_none()
            && self.shard_lists(collection) == self.shard_lists(proto)
    }

    /// Apply one operation.
    pub fn apply(&mut self, operation: &RepairOperation) -> Result<(), ApplyError> {
        match operation {
            RepairOperation::MoveShard(op) => self.apply_move(op)?,
            RepairOperation::AgencyTransaction(trx) => self.apply_transaction(trx)?,
        }
        self.applied += 1;
        Ok(())
    }

    /// Apply operations in order, stopping at the first rejected one.
    pub fn apply_all<'a>(
        &mut self,
        operations: impl IntoIterator<Item = &'a RepairOperation>,
    ) -> Result<usize, ApplyError> {
        let mut count = 0;
        for operation in operations {
            self.apply(operation)?;
            count += 1;
        }
        Ok(count)
    }

    /// Plan and apply until the plan is empty.
    ///
    /// Returns the number of rounds that applied something. Panics if the
    /// plan does not converge within `max_rounds` or an operation is rejected.
    pub fn repair(&mut self, max_rounds: usize) -> usize {
        for round in 0..max_rounds {
            let plan = self.plan();
            if plan.is_empty() {
                return round;
            }
            let operations: Vec<RepairOperation> = plan.operations().cloned().collect();
            if let Err(e) = self.apply_all(&operations) {
                panic!("round {round}: {e}");
            }
        }
        panic!("no convergence after {max_rounds} rounds");
    }

    fn apply_move(&mut self, op: &MoveShardOperation) -> Result<(), ApplyError> {
        let path = shard_path(op.collection.as_str(), op.shard.as_str());
        let mut servers = self.shard(op.collection.as_str(), op.shard.as_str());
        if servers.is_empty() {
            return Err(ApplyError::BadMove(format!("{path} does not exist")));
        }

        let from = op.from.as_str();
        let to = op.to.as_str();
        if servers.iter().any(|s| s == to) {
            return Err(ApplyError::BadMove(format!("{to} already holds {path}")));
        }
        if !self.snapshot().healthy_servers().iter().any(|s| s.as_str() == to) {
            return Err(ApplyError::BadMove(format!("{to} is not healthy")));
        }

        let position = servers.iter().position(|s| s == from);
        match position {
            Some(0) if op.is_leader => servers[0] = to.to_string(),
            Some(i) if i > 0 && !op.is_leader => servers[i] = to.to_string(),
            _ => {
                return Err(ApplyError::BadMove(format!(
                    "{from} is not the {} of {path}",
                    if op.is_leader { "leader" } else { "follower" }
                )));
            }
        }

        self.set(&path, json!(servers));
        self.bump_version();
        Ok(())
    }

    fn apply_transaction(&mut self, trx: &AgencyWriteTransaction) -> Result<(), ApplyError> {
        for precondition in &trx.preconditions {
            let current = self.get(&precondition.path);
            let holds = match &precondition.condition {
                Condition::Equals(value) => current == Some(value),
                Condition::Empty => current.is_none(),
            };
            if !holds {
                return Err(ApplyError::PreconditionFailed(precondition.path.clone()));
            }
        }

        for write in &trx.writes {
            match &write.op {
                WriteOp::Set(value) => self.set(&write.path, value.clone()),
                WriteOp::Delete => self.delete(&write.path),
                WriteOp::Increment => {
                    let next = self.get(&write.path).and_then(Value::as_u64).unwrap_or(0) + 1;
                    self.set(&write.path, json!(next));
                }
            }
        }
        Ok(())
    }

    fn bump_version(&mut self) {
        let next = self.plan_version() + 1;
        self.set("Plan/Version", json!(next));
    }

    fn get(&self, path: &str) -> Option<&Value> {
        self.root.pointer(&format!("/{path}"))
    }

    fn set(&mut self, path: &str, value: Value) {
        let mut node = &mut self.root;
        for key in path.split('/') {
            if !node.is_object() {
                *node = json!({});
            }
            node = node
                .as_object_mut()
                .expect("just made an object")
                .entry(key)
                .or_insert(Value::Null);
        }
        *node = value;
    }

    fn delete(&mut self, path: &str) {
        let (parent, key) = match path.rsplit_once('/') {
            Some((parent, key)) => (format!("/{parent}"), key),
            None => (String::new(), path),
        };
        if let Some(map) = self.root.pointer_mut(&parent).and_then(Value::as_object_mut) {
            map.remove(key);
        }
    }
}

/// `Plan/Collections/db/<collection>`.
pub fn collection_path(collection: &str) -> String {
    format!("Plan/Collections/{DATABASE}/{collection}")
}

/// `Plan/Collections/db/<collection>/shards/<shard>`.
pub fn shard_path(collection: &str, shard: &str) -> String {
    format!("{}/shards/{shard}", collection_path(collection))
}

// =========================================================================
// Scrambled clusters
// =========================================================================

/// Deterministic xorshift generator for building scrambled layouts.
pub struct Scrambler(u64);

impl Scrambler {
    pub fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }

    pub fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    /// Pick `n` distinct servers from `pool` in random order.
    pub fn pick<'a>(&mut self, pool: &[&'a str], n: usize) -> Vec<&'a str> {
        let mut pool = pool.to_vec();
        let mut picked = Vec::with_capacity(n);
        while picked.len() < n && !pool.is_empty() {
            let i = (self.next() % pool.len() as u64) as usize;
            picked.push(pool.swap_remove(i));
        }
        picked
    }
}

/// A prototype `"1"` and `linked` collections `"2"`, `"3"`, ... all with
/// independently scrambled placements over `servers`.
pub fn scrambled_cluster(
    seed: u64,
    servers: &[&str],
    shards: usize,
    replication_factor: usize,
    linked: usize,
) -> SimAgency {
    let mut rng = Scrambler::new(seed);
    let mut builder = ClusterBuilder::new().servers(servers);

    let proto = layout(&mut rng, servers, shards, replication_factor, 1);
    builder = builder.prototype("1", "proto", &borrowed(&proto));

    for n in 0..linked {
        let id = (n + 2).to_string();
        let layout = layout(&mut rng, servers, shards, replication_factor, (n + 1) * 1000);
        builder = builder.linked(&id, &format!("linked{n}"), "1", &borrowed(&layout));
    }

    builder.build()
}

fn layout<'a>(
    rng: &mut Scrambler,
    servers: &[&'a str],
    shards: usize,
    replication_factor: usize,
    base: usize,
) -> Vec<(String, Vec<&'a str>)> {
    (0..shards)
        .map(|i| (format!("s{}", base + i), rng.pick(servers, replication_factor)))
        .collect()
}

fn borrowed<'a>(layout: &'a [(String, Vec<&'a str>)]) -> Vec<(&'a str, &'a [&'a str])> {
    layout
        .iter()
        .map(|(shard, servers)| (shard.as_str(), servers.as_slice()))
        .collect()
}
