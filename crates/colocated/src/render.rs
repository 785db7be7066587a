//! Rendering a [`RepairPlan`] as agency JSON.

use colocate_agency::paths;
use colocate_repair::{CollectionRepair, RepairOperation, RepairPlan};
use serde_json::{Value, json};

/// One line of `colocated plan` output per operation, in plan order.
///
/// Moves become `{"path": ..., "todo": ...}` job documents numbered from
/// `id_start`; transactions are printed in the agency write format.
pub fn plan_lines(plan: &RepairPlan, prefix: &str, creator: &str, id_start: u64) -> Vec<Value> {
    let mut job_id = id_start;
    let mut lines = Vec::new();

    for operation in plan.operations() {
        match operation {
            RepairOperation::MoveShard(op) => {
                lines.push(json!({
                    "path": paths::absolute(prefix, &paths::todo_path(job_id)),
                    "todo": op.to_todo(job_id, creator),
                }));
                job_id += 1;
            }
            RepairOperation::AgencyTransaction(trx) => {
                lines.push(trx.to_agency_json(prefix));
            }
        }
    }

    lines
}

/// Status of one linked collection for `colocated check`.
pub fn check_status(repair: Option<&CollectionRepair>) -> String {
    match repair.map(|r| &r.outcome) {
        None => "ok".to_string(),
        Some(Ok(operations)) => format!("needs repair ({} operations)", operations.len()),
        Some(Err(e)) => format!("broken: {e}"),
    }
}

/// Closing line of `colocated check`.
///
/// Collections absent from `plan` are consistent; a repairing collection
/// that only waits for its restore still counts as needing repair.
pub fn check_summary(linked: usize, plan: &RepairPlan) -> String {
    let broken = plan.errors().count();
    format!(
        "{linked} linked collections, {} need repair, {broken} broken",
        plan.collections.len() - broken
    )
}
