//! Integration test: interrupted and raced repairs.
//!
//! A repair may stop after any operation, and the cluster may change between
//! planning and applying. Planning again from the new state must finish the
//! job, and stale operations must be rejected rather than applied.

use colocate_agency::Condition;
use colocate_integration_tests::{ApplyError, ClusterBuilder, SimAgency, scrambled_cluster, shard_path};
use colocate_repair::RepairOperation;
use colocate_types::ShardLink;
use serde_json::json;

const SERVERS: &[&str] = &["a", "b", "c", "d", "e"];

fn operations(agency: &SimAgency) -> Vec<RepairOperation> {
    agency.plan().operations().cloned().collect()
}

/// Stopping after any prefix of the plan and replanning converges.
#[test]
fn test_resume_after_every_prefix() {
    for seed in 1..=10 {
        let initial = scrambled_cluster(seed, SERVERS, 4, 3, 2);
        let plan = operations(&initial);

        for stop in 0..=plan.len() {
            let mut agency = initial.clone();
            agency
                .apply_all(&plan[..stop])
                .unwrap_or_else(|e| panic!("seed {seed}, stop {stop}: {e}"));

            agency.repair(5);
            assert!(
                agency.is_consistent("2", "1") && agency.is_consistent("3", "1"),
                "seed {seed}: no convergence after stopping at {stop}"
            );
        }
    }
}

/// After the rename, the collection carries the repairing marker until the
/// restore is applied.
#[test]
fn test_marker_visible_while_repairing() {
    let mut agency = ClusterBuilder::new()
        .servers(SERVERS)
        .prototype("1", "proto", &[("s1", &["a", "b"])])
        .linked("2", "linked", "1", &[("s2", &["c", "b"])])
        .build();

    let plan = operations(&agency);
    assert_eq!(plan.len(), 3);

    agency.apply(&plan[0]).unwrap();
    assert_eq!(
        agency.attribute("2", ShardLink::REPAIRING_ATTRIBUTE),
        Some(&json!("1"))
    );
    assert!(agency.attribute("2", ShardLink::LINKED_ATTRIBUTE).is_none());

    // Resuming from here does not rename again.
    let resumed = operations(&agency);
    assert_eq!(resumed.len(), 2);
    assert_eq!(resumed[0], plan[1]);
    assert_eq!(resumed[1], plan[2]);
}

/// A repairing collection already in place only needs the restore.
#[test]
fn test_consistent_repairing_collection_is_restored() {
    let mut agency = ClusterBuilder::new()
        .servers(SERVERS)
        .prototype("1", "proto", &[("s1", &["a", "b"]), ("s2", &["c", "d"])])
        .repairing("2", "linked", "1", &[("s3", &["a", "b"]), ("s4", &["c", "d"])])
        .build();

    let plan = operations(&agency);
    assert_eq!(plan.len(), 1);
    assert!(plan[0].as_transaction().is_some());

    agency.apply(&plan[0]).unwrap();
    assert!(agency.is_consistent("2", "1"));
    assert!(agency.plan().is_empty());
}

/// A shard changed behind the planner's back fails the precondition of the
/// rewrite instead of being overwritten.
#[test]
fn test_stale_rewrite_is_rejected() {
    let mut agency = ClusterBuilder::new()
        .servers(SERVERS)
        .prototype("1", "proto", &[("s1", &["a", "b", "c"])])
        .linked("2", "linked", "1", &[("s2", &["a", "c", "b"])])
        .build();

    let plan = operations(&agency);
    assert_eq!(plan.len(), 3);
    let rewrite = plan[1].as_transaction().unwrap();
    assert_eq!(
        rewrite.precondition_on(&shard_path("2", "s2")),
        Some(&Condition::Equals(json!(["a", "c", "b"])))
    );

    agency.apply(&plan[0]).unwrap();
    agency.set_shard("2", "s2", &["a", "d", "b"]);

    assert_eq!(
        agency.apply(&plan[1]),
        Err(ApplyError::PreconditionFailed(shard_path("2", "s2")))
    );
    assert_eq!(agency.shard("2", "s2"), vec!["a", "d", "b"]);

    // The restore is stale as well.
    assert!(matches!(
        agency.apply(&plan[2]),
        Err(ApplyError::PreconditionFailed(_))
    ));

    agency.repair(3);
    assert!(agency.is_consistent("2", "1"));
}

/// A prototype that changes mid-repair invalidates the planned rewrite.
#[test]
fn test_moved_prototype_rejects_rewrite() {
    let mut agency = ClusterBuilder::new()
        .servers(SERVERS)
        .prototype("1", "proto", &[("s1", &["a", "b", "c"])])
        .linked("2", "linked", "1", &[("s2", &["a", "c", "b"])])
        .build();

    let plan = operations(&agency);
    agency.apply(&plan[0]).unwrap();
    agency.set_shard("1", "s1", &["a", "c", "b"]);

    assert_eq!(
        agency.apply(&plan[1]),
        Err(ApplyError::PreconditionFailed(shard_path("1", "s1")))
    );

    // The linked collection now already matches; only the restore remains.
    let resumed = operations(&agency);
    assert_eq!(resumed.len(), 1);
    agency.apply(&resumed[0]).unwrap();
    assert!(agency.is_consistent("2", "1"));
}

/// A server failing between rounds is avoided as a hop.
#[test]
fn test_failed_server_not_used_as_hop() {
    let mut agency = ClusterBuilder::new()
        .servers(&["a", "b", "c", "d"])
        .prototype("1", "proto", &[("s1", &["b", "a"])])
        .linked("2", "linked", "1", &[("s2", &["a", "b"])])
        .build();

    agency.set_health("c", "FAILED");
    let plan = operations(&agency);
    let hop = plan[1].as_move_shard().unwrap();
    assert_eq!(hop.to.as_str(), "d");

    agency.repair(3);
    assert!(agency.is_consistent("2", "1"));
}
