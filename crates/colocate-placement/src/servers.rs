//! Set operations over ordered server lists.
//!
//! Server lists are short (one entry per replica), so these are linear scans
//! that keep the input order instead of going through hash sets.

use colocate_types::{ServerId, ServerList};
use tracing::debug;

/// Servers in `a` that are not in `b`, in `a`'s order.
pub fn difference(a: &[ServerId], b: &[ServerId]) -> ServerList {
    a.iter().filter(|s| !b.contains(s)).cloned().collect()
}

/// Servers present in exactly one of `a` and `b`.
///
/// The `a`-only servers come first in `a`'s order, followed by the `b`-only
/// servers in `b`'s order. An empty result for two unequal lists means they
/// differ only in order.
pub fn symmetric_difference(a: &[ServerId], b: &[ServerId]) -> ServerList {
    let mut result = difference(a, b);
    result.extend(difference(b, a));
    result
}

/// Pick a healthy server that is not in `used`.
///
/// Candidates are considered in ascending ID order so the choice does not
/// depend on how the caller happened to order `healthy`.
pub fn find_free_server(healthy: &[ServerId], used: &[ServerId]) -> Option<ServerId> {
    let free = healthy.iter().filter(|s| !used.contains(s)).min().cloned();

    if free.is_none() {
        debug!(
            healthy = healthy.len(),
            used = used.len(),
            "no free server available"
        );
    }

    free
}
