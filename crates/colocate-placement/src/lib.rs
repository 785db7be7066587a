//! Shard ordering and server set algebra for colocated shard placement.
//!
//! A linked collection mirrors its prototype shard-for-shard. Shards are paired
//! by their rank under the [`natural`] order, so that `s9` lines up with `s9`'s
//! counterpart rather than landing after `s10` as plain string sorting would
//! have it. The [`servers`] module provides the small set operations used to
//! decide whether a shard needs an order-only fix or a real migration, and to
//! pick a temporary hop server when a migration would otherwise collide.

pub mod natural;
pub mod servers;

pub use natural::{NaturalKey, natural_cmp, sort_natural};
pub use servers::{difference, find_free_server, symmetric_difference};
