//! Agency key paths used by the repair planner.
//!
//! All paths are relative to the agency prefix (usually `arango`); the prefix
//! is only added when a transaction is rendered for submission.

/// Known database servers.
pub const PLAN_DB_SERVERS: &str = "Plan/DBServers";

/// Collections by database.
pub const PLAN_COLLECTIONS: &str = "Plan/Collections";

/// Plan version, bumped by every plan change so servers notice it.
pub const PLAN_VERSION: &str = "Plan/Version";

/// Health records by server.
pub const SUPERVISION_HEALTH: &str = "Supervision/Health";

/// Pending jobs of the supervision job queue.
pub const TARGET_TODO: &str = "Target/ToDo";

/// Path of a job document in the to-do queue.
pub fn todo_path(job_id: u64) -> String {
    format!("{TARGET_TODO}/{job_id}")
}

/// Prepend the agency prefix to a relative path: `Plan/Version` → `/arango/Plan/Version`.
pub fn absolute(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        format!("/{path}")
    } else {
        format!("/{prefix}/{path}")
    }
}
