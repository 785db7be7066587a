//! Error types for reading agency snapshots.

/// Errors produced while reading a plan snapshot.
///
/// Any of these means the snapshot itself is malformed; no repair can be
/// planned from it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AgencyError {
    /// A required attribute is absent.
    #[error("missing field: {path}")]
    MissingField {
        /// Agency path of the missing attribute.
        path: String,
    },

    /// An attribute has an unexpected JSON type.
    #[error("wrong type at {path}: expected {expected}")]
    WrongType {
        /// Agency path of the attribute.
        path: String,
        /// Human-readable name of the expected type.
        expected: &'static str,
    },

    /// A shard has no servers at all.
    #[error("shard {shard} of collection {collection} has no servers")]
    EmptyServerList {
        /// Collection ID.
        collection: String,
        /// Shard ID.
        shard: String,
    },

    /// A server appears twice in one shard's server list.
    #[error("server {server} appears more than once in shard {shard} of collection {collection}")]
    DuplicateServer {
        /// Collection ID.
        collection: String,
        /// Shard ID.
        shard: String,
        /// The repeated server.
        server: String,
    },

    /// Both `distributeShardsLike` and `repairingDistributeShardsLike` are set.
    #[error(
        "collection {collection} has both distributeShardsLike and repairingDistributeShardsLike set"
    )]
    InconsistentAttributes {
        /// Collection ID.
        collection: String,
    },

    /// The same collection ID appears under two databases.
    #[error("collection id {collection} appears in more than one database")]
    DuplicateCollection {
        /// Collection ID.
        collection: String,
    },

    /// A health record carries a status this reader does not know.
    #[error("unknown health status {status:?} for server {server}")]
    UnknownHealthStatus {
        /// Server ID.
        server: String,
        /// The status string found.
        status: String,
    },
}
