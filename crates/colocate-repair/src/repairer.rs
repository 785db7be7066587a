//! The `distributeShardsLike` repair planner.
//!
//! For every linked collection whose shards are not placed like its
//! prototype's, [`DistributeShardsLikeRepairer`] emits:
//!
//! 1. a transaction renaming `distributeShardsLike` to
//!    `repairingDistributeShardsLike`, so the rest of the cluster stops
//!    treating the collection as consistent while it is being moved around;
//! 2. per shard (paired with the prototype's shard of the same natural rank):
//!    leader moves, then follower moves, then an order-only plan rewrite;
//! 3. a transaction renaming the attribute back, preconditioned on every
//!    shard having reached the prototype's placement.
//!
//! The marker written in step 1 is visible in the next snapshot, so a run
//! interrupted at any point is resumed by simply planning again.

use colocate_agency::{AgencyWriteTransaction, Collection, PlanSnapshot, servers_json};
use colocate_placement::{difference, find_free_server, symmetric_difference};
use colocate_types::{CollectionId, ServerId, ServerList, ShardId, ShardLink};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::error::{RepairError, StructuralError};
use crate::operation::{MoveShardOperation, RepairOperation};
use crate::plan::{CollectionRepair, RepairPlan};

type Result<T> = std::result::Result<T, RepairError>;

/// Plans repairs for all linked collections of a snapshot.
pub fn repair_distribute_shards_like(snapshot: &PlanSnapshot) -> RepairPlan {
    DistributeShardsLikeRepairer::new(snapshot).repair_distribute_shards_like()
}

/// Reads an agency dump and plans repairs for it.
///
/// A malformed dump fails the whole call with [`RepairError::Data`].
pub fn plan_from_agency(dump: &Value, prefix: &str) -> Result<RepairPlan> {
    let snapshot = PlanSnapshot::from_agency_dump(dump, prefix)?;
    Ok(repair_distribute_shards_like(&snapshot))
}

/// Repair planner over one immutable [`PlanSnapshot`].
pub struct DistributeShardsLikeRepairer<'a> {
    snapshot: &'a PlanSnapshot,
    /// Healthy database servers, ascending.
    healthy: ServerList,
}

/// One shard of a linked collection paired with its prototype shard.
struct ShardPair<'a> {
    collection: &'a Collection,
    proto: &'a Collection,
    shard: &'a ShardId,
    proto_shard: &'a ShardId,
    proto_servers: &'a ServerList,
}

impl<'a> DistributeShardsLikeRepairer<'a> {
    /// Create a planner for `snapshot`.
    pub fn new(snapshot: &'a PlanSnapshot) -> Self {
        Self {
            snapshot,
            healthy: snapshot.healthy_servers(),
        }
    }

    /// Plan repairs for every collection that needs one.
    ///
    /// Collections that are already placed like their prototype produce no
    /// entry at all.
    pub fn repair_distribute_shards_like(&self) -> RepairPlan {
        let mut plan = RepairPlan::default();

        for collection in self.collections_to_fix() {
            let outcome = self.repair_collection(collection);

            match &outcome {
                Ok(operations) => {
                    info!(
                        collection = %collection.full_name(),
                        operations = operations.len(),
                        "planned distributeShardsLike repair"
                    );
                }
                Err(e) => {
                    warn!(
                        collection = %collection.full_name(),
                        error = %e,
                        "cannot plan distributeShardsLike repair"
                    );
                }
            }

            plan.collections.push(CollectionRepair {
                collection: collection.id.clone(),
                full_name: collection.full_name(),
                outcome,
            });
        }

        plan
    }

    /// Linked collections that are not placed like their prototype, and
    /// collections a previous run left in the repairing state.
    ///
    /// Links that cannot be checked (prototype missing, shard counts differ)
    /// are included so that planning reports them.
    pub fn collections_to_fix(&self) -> Vec<&'a Collection> {
        self.snapshot
            .collections()
            .filter(|collection| match &collection.link {
                ShardLink::None => false,
                ShardLink::Repairing(_) => true,
                ShardLink::Linked(proto_id) => match self.snapshot.collection(proto_id) {
                    None => true,
                    Some(proto) => {
                        proto.shard_count() != collection.shard_count()
                            || collection
                                .shards
                                .values()
                                .zip(proto.shards.values())
                                .any(|(servers, proto_servers)| servers != proto_servers)
                    }
                },
            })
            .collect()
    }

    /// Plan one collection. Either every operation is returned or none.
    fn repair_collection(&self, collection: &Collection) -> Result<Vec<RepairOperation>> {
        let Some(proto_id) = collection.link.prototype() else {
            return Ok(Vec::new());
        };
        let proto = self.prototype_of(collection, proto_id)?;
        check_structure(collection, proto)?;

        let mut operations: Vec<RepairOperation> = Vec::new();

        if !collection.link.is_repairing() {
            operations.push(rename_distribute_shards_like(collection, proto_id).into());
        }

        let mut final_servers = Vec::with_capacity(collection.shard_count());
        for ((shard, servers), (proto_shard, proto_servers)) in
            collection.shards.iter().zip(proto.shards.iter())
        {
            let pair = ShardPair {
                collection,
                proto,
                shard: &shard.0,
                proto_shard: &proto_shard.0,
                proto_servers,
            };
            let mut current = servers.clone();
            operations.extend(self.fix_shard(&pair, &mut current)?);
            final_servers.push((&shard.0, current));
        }

        operations.push(restore_distribute_shards_like(collection, proto_id, &final_servers).into());

        for operation in &operations {
            debug!(collection = %collection.full_name(), %operation, "repair operation");
        }

        Ok(operations)
    }

    fn prototype_of(
        &self,
        collection: &Collection,
        proto_id: &CollectionId,
    ) -> Result<&'a Collection> {
        self.snapshot.collection(proto_id).ok_or_else(|| {
            StructuralError::MissingPrototype {
                collection: collection.full_name(),
                prototype: proto_id.clone(),
            }
            .into()
        })
    }

    /// Bring one shard to its prototype shard's placement.
    ///
    /// `current` tracks the shard's servers as they will be once every
    /// operation emitted so far has been applied.
    fn fix_shard(
        &self,
        pair: &ShardPair<'_>,
        current: &mut ServerList,
    ) -> Result<Vec<RepairOperation>> {
        self.check_destinations(pair, current)?;

        let mut operations = self.fix_leader(pair, current)?;

        // Leaders agree now, so both sides miss the same number of servers.
        let missing = difference(pair.proto_servers, current);
        let surplus = difference(current, pair.proto_servers);

        for (to, from) in missing.into_iter().zip(surplus) {
            operations.push(move_shard(pair, current, from, to, false).into());
        }

        if let Some(trx) = fix_server_order(pair, current) {
            operations.push(trx.into());
        }

        Ok(operations)
    }

    /// Every server the prototype makes this shard move to must be healthy.
    ///
    /// That is the prototype's leader if leadership changes hands, and every
    /// prototype server the shard does not have yet.
    fn check_destinations(&self, pair: &ShardPair<'_>, current: &[ServerId]) -> Result<()> {
        let leader_changes = current.first() != pair.proto_servers.first();
        let mut destinations = difference(pair.proto_servers, current);
        if let Some(proto_leader) = pair.proto_servers.first().filter(|_| leader_changes) {
            destinations.push(proto_leader.clone());
        }

        match destinations.iter().find(|s| !self.healthy.contains(s)) {
            None => Ok(()),
            Some(server) => {
                debug!(shard = %pair.shard, %server, "prototype server is not healthy");
                Err(RepairError::ResourceExhausted {
                    collection: pair.collection.full_name(),
                    shard: pair.shard.clone(),
                    healthy: self.healthy.len(),
                })
            }
        }
    }

    /// Hand leadership to the prototype shard's leader.
    ///
    /// If that server already follows on this shard it cannot also become
    /// leader, so it first moves its follower replica to a free healthy
    /// server. The shard keeps its replica count throughout.
    fn fix_leader(
        &self,
        pair: &ShardPair<'_>,
        current: &mut ServerList,
    ) -> Result<Vec<RepairOperation>> {
        let (Some(leader), Some(proto_leader)) = (current.first(), pair.proto_servers.first())
        else {
            return Ok(Vec::new());
        };
        if leader == proto_leader {
            return Ok(Vec::new());
        }
        let leader = leader.clone();
        let proto_leader = proto_leader.clone();

        let mut operations: Vec<RepairOperation> = Vec::new();

        if current.contains(&proto_leader) {
            let Some(hop) = find_free_server(&self.healthy, current) else {
                return Err(RepairError::ResourceExhausted {
                    collection: pair.collection.full_name(),
                    shard: pair.shard.clone(),
                    healthy: self.healthy.len(),
                });
            };
            debug!(
                shard = %pair.shard,
                server = %proto_leader,
                %hop,
                "moving follower out of the way of the new leader"
            );
            operations.push(move_shard(pair, current, proto_leader.clone(), hop, false).into());
        }

        operations.push(move_shard(pair, current, leader, proto_leader, true).into());
        Ok(operations)
    }
}

/// Reject links that no sequence of moves can repair.
fn check_structure(collection: &Collection, proto: &Collection) -> Result<()> {
    if collection.shard_count() != proto.shard_count() {
        return Err(StructuralError::MismatchingShardCount {
            collection: collection.full_name(),
            prototype: proto.full_name(),
            shards: collection.shard_count(),
            prototype_shards: proto.shard_count(),
        }
        .into());
    }

    if collection.replication_factor != proto.replication_factor {
        return Err(StructuralError::MismatchingReplicationFactor {
            collection: collection.full_name(),
            prototype: proto.full_name(),
            replication_factor: collection.replication_factor,
            prototype_replication_factor: proto.replication_factor,
        }
        .into());
    }

    for ((shard, servers), (proto_shard, proto_servers)) in
        collection.shards.iter().zip(proto.shards.iter())
    {
        if servers.len() != proto_servers.len() {
            return Err(StructuralError::MismatchingServerCount {
                collection: collection.full_name(),
                shard: shard.0.clone(),
                prototype_shard: proto_shard.0.clone(),
                servers: servers.len(),
                prototype_servers: proto_servers.len(),
            }
            .into());
        }
    }

    Ok(())
}

/// Create a move and apply it to `current`.
fn move_shard(
    pair: &ShardPair<'_>,
    current: &mut ServerList,
    from: ServerId,
    to: ServerId,
    is_leader: bool,
) -> MoveShardOperation {
    if is_leader {
        if let Some(leader) = current.first_mut() {
            *leader = to.clone();
        }
    } else if let Some(slot) = current.iter_mut().find(|s| **s == from) {
        *slot = to.clone();
    }

    MoveShardOperation {
        database: pair.collection.database.clone(),
        collection: pair.collection.id.clone(),
        shard: pair.shard.clone(),
        from,
        to,
        is_leader,
    }
}

/// Rewrite a shard's server list to the prototype's order.
///
/// Only applies once membership agrees, so no data has to move. Returns
/// `None` if the order already matches or the members still differ.
fn fix_server_order(pair: &ShardPair<'_>, current: &mut ServerList) -> Option<AgencyWriteTransaction> {
    if *current == *pair.proto_servers
        || !symmetric_difference(current, pair.proto_servers).is_empty()
    {
        return None;
    }

    let shard_path = pair.collection.shard_path(pair.shard);
    let trx = AgencyWriteTransaction::new()
        .set(&shard_path, servers_json(pair.proto_servers))
        .bump_plan_version()
        .expect(&shard_path, servers_json(current))
        .expect(
            pair.proto.shard_path(pair.proto_shard),
            servers_json(pair.proto_servers),
        );

    *current = pair.proto_servers.clone();
    Some(trx)
}

/// Rename an attribute of `collection`, asserting its current value.
fn rename_attribute(
    collection: &Collection,
    value: &CollectionId,
    from: &str,
    to: &str,
) -> AgencyWriteTransaction {
    let from_path = collection.attribute_path(from);
    let to_path = collection.attribute_path(to);

    AgencyWriteTransaction::new()
        .set(&to_path, json!(value))
        .delete(&from_path)
        .bump_plan_version()
        .expect(&from_path, json!(value))
        .expect_empty(&to_path)
}

/// `distributeShardsLike` → `repairingDistributeShardsLike`.
fn rename_distribute_shards_like(
    collection: &Collection,
    proto_id: &CollectionId,
) -> AgencyWriteTransaction {
    rename_attribute(
        collection,
        proto_id,
        ShardLink::LINKED_ATTRIBUTE,
        ShardLink::REPAIRING_ATTRIBUTE,
    )
}

/// `repairingDistributeShardsLike` → `distributeShardsLike`, once every shard
/// holds its planned final server list.
fn restore_distribute_shards_like(
    collection: &Collection,
    proto_id: &CollectionId,
    final_servers: &[(&ShardId, ServerList)],
) -> AgencyWriteTransaction {
    let mut trx = rename_attribute(
        collection,
        proto_id,
        ShardLink::REPAIRING_ATTRIBUTE,
        ShardLink::LINKED_ATTRIBUTE,
    );

    for (shard, servers) in final_servers {
        trx = trx.expect(collection.shard_path(shard), servers_json(servers));
    }

    trx
}
