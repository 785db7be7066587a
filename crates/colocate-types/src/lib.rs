//! Shared types and identifiers for colocate.
//!
//! This crate defines the core types used across the colocate workspace:
//! identifiers ([`ServerId`], [`ShardId`], [`CollectionId`], [`DatabaseId`]),
//! server lists ([`ServerList`]), supervision health ([`HealthStatus`]) and the
//! `distributeShardsLike` link state of a collection ([`ShardLink`]).

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ID types
// ---------------------------------------------------------------------------

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create an ID from anything string-like.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Return the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

define_id!(
    /// Identifier of a database server (e.g. `PRMR-6b7c1a2e`).
    ServerId
);

define_id!(
    /// Identifier of a shard (e.g. `s100017`).
    ShardId
);

define_id!(
    /// Cluster-wide identifier of a collection (numeric string in the plan).
    CollectionId
);

define_id!(
    /// Name of a database.
    DatabaseId
);

/// Ordered servers responsible for one shard.
///
/// Index 0 is the leader, the rest are followers in failover priority order.
pub type ServerList = Vec<ServerId>;

// ---------------------------------------------------------------------------
// Cluster types
// ---------------------------------------------------------------------------

/// Health of a database server as reported under `Supervision/Health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    /// Server is responding to heartbeats.
    Good,
    /// Server has missed heartbeats; failover may be imminent.
    Bad,
    /// Server has been declared failed by the supervision.
    Failed,
}

impl HealthStatus {
    /// Parse the agency representation (`"GOOD"`, `"BAD"`, `"FAILED"`).
    pub fn from_agency(status: &str) -> Option<Self> {
        match status {
            "GOOD" => Some(Self::Good),
            "BAD" => Some(Self::Bad),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }

    /// The agency representation of this status.
    pub fn as_agency_str(&self) -> &'static str {
        match self {
            Self::Good => "GOOD",
            Self::Bad => "BAD",
            Self::Failed => "FAILED",
        }
    }

    /// Whether the server may receive shards.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Good)
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_agency_str())
    }
}

/// The `distributeShardsLike` state of a collection.
///
/// The plan stores this as two attributes, `distributeShardsLike` and
/// `repairingDistributeShardsLike`, of which at most one may be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShardLink {
    /// The collection places its shards independently.
    #[default]
    None,
    /// Shards must follow the prototype's placement.
    Linked(CollectionId),
    /// A repair towards the prototype's placement is in progress.
    Repairing(CollectionId),
}

impl ShardLink {
    /// Agency attribute holding the prototype of a linked collection.
    pub const LINKED_ATTRIBUTE: &'static str = "distributeShardsLike";

    /// Agency attribute holding the prototype while a repair is in progress.
    pub const REPAIRING_ATTRIBUTE: &'static str = "repairingDistributeShardsLike";

    /// The prototype collection, if any.
    pub fn prototype(&self) -> Option<&CollectionId> {
        match self {
            Self::None => None,
            Self::Linked(proto) | Self::Repairing(proto) => Some(proto),
        }
    }

    /// Whether a previous repair left this collection mid-way.
    pub fn is_repairing(&self) -> bool {
        matches!(self, Self::Repairing(_))
    }
}
