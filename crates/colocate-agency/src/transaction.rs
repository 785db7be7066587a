//! Conditioned multi-key agency writes.
//!
//! An [`AgencyWriteTransaction`] is applied atomically: either every
//! precondition holds and every write happens, or nothing changes. Repair
//! transactions assert the exact values they were planned from, so a plan
//! computed from a stale snapshot is rejected instead of clobbering newer state.

use std::fmt;

use serde_json::{Map, Value, json};

use crate::paths;

/// What a single write does to its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Replace the value.
    Set(Value),
    /// Remove the key.
    Delete,
    /// Increment a numeric value by one.
    Increment,
}

/// One key written by a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgencyWrite {
    /// Path relative to the agency prefix.
    pub path: String,
    /// The operation on that path.
    pub op: WriteOp,
}

/// What a precondition asserts about its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// The key holds exactly this value.
    Equals(Value),
    /// The key does not exist.
    Empty,
}

/// One key checked before a transaction is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgencyPrecondition {
    /// Path relative to the agency prefix.
    pub path: String,
    /// The asserted state.
    pub condition: Condition,
}

/// An atomic, preconditioned agency write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgencyWriteTransaction {
    /// Writes, applied in order.
    pub writes: Vec<AgencyWrite>,
    /// Preconditions, all of which must hold.
    pub preconditions: Vec<AgencyPrecondition>,
}

impl AgencyWriteTransaction {
    /// Create an empty transaction.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a write that sets `path` to `value`.
    pub fn set(mut self, path: impl Into<String>, value: Value) -> Self {
        self.writes.push(AgencyWrite {
            path: path.into(),
            op: WriteOp::Set(value),
        });
        self
    }

    /// Add a write that removes `path`.
    pub fn delete(mut self, path: impl Into<String>) -> Self {
        self.writes.push(AgencyWrite {
            path: path.into(),
            op: WriteOp::Delete,
        });
        self
    }

    /// Add a write that increments the number at `path`.
    pub fn increment(mut self, path: impl Into<String>) -> Self {
        self.writes.push(AgencyWrite {
            path: path.into(),
            op: WriteOp::Increment,
        });
        self
    }

    /// Require `path` to currently hold `value`.
    pub fn expect(mut self, path: impl Into<String>, value: Value) -> Self {
        self.preconditions.push(AgencyPrecondition {
            path: path.into(),
            condition: Condition::Equals(value),
        });
        self
    }

    /// Require `path` to currently not exist.
    pub fn expect_empty(mut self, path: impl Into<String>) -> Self {
        self.preconditions.push(AgencyPrecondition {
            path: path.into(),
            condition: Condition::Empty,
        });
        self
    }

    /// Add a write that bumps `Plan/Version`.
    pub fn bump_plan_version(self) -> Self {
        self.increment(paths::PLAN_VERSION)
    }

    /// The write to `path`, if this transaction has one.
    pub fn write_to(&self, path: &str) -> Option<&WriteOp> {
        self.writes.iter().find(|w| w.path == path).map(|w| &w.op)
    }

    /// The precondition on `path`, if this transaction has one.
    pub fn precondition_on(&self, path: &str) -> Option<&Condition> {
        self.preconditions
            .iter()
            .find(|p| p.path == path)
            .map(|p| &p.condition)
    }

    /// Render the transaction in the agency's write format.
    ///
    /// ```text
    /// [ { "/arango/Plan/...": {"op": "set", "new": ...}, ... },
    ///   { "/arango/Plan/...": {"old": ...}, ... } ]
    /// ```
    pub fn to_agency_json(&self, prefix: &str) -> Value {
        let mut operations = Map::new();
        for write in &self.writes {
            let op = match &write.op {
                WriteOp::Set(value) => json!({ "op": "set", "new": value }),
                WriteOp::Delete => json!({ "op": "delete" }),
                WriteOp::Increment => json!({ "op": "increment" }),
            };
            operations.insert(paths::absolute(prefix, &write.path), op);
        }

        let mut preconditions = Map::new();
        for precondition in &self.preconditions {
            let condition = match &precondition.condition {
                Condition::Equals(value) => json!({ "old": value }),
                Condition::Empty => json!({ "oldEmpty": true }),
            };
            preconditions.insert(paths::absolute(prefix, &precondition.path), condition);
        }

        Value::Array(vec![Value::Object(operations), Value::Object(preconditions)])
    }
}

impl fmt::Display for AgencyWriteTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AgencyWriteTransaction(")?;
        for (i, write) in self.writes.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match &write.op {
                WriteOp::Set(value) => write!(f, "set {} = {value}", write.path)?,
                WriteOp::Delete => write!(f, "delete {}", write.path)?,
                WriteOp::Increment => write!(f, "increment {}", write.path)?,
            }
        }
        write!(f, "; if ")?;
        for (i, precondition) in self.preconditions.iter().enumerate() {
            if i > 0 {
                write!(f, " and ")?;
            }
            match &precondition.condition {
                Condition::Equals(value) => write!(f, "{} == {value}", precondition.path)?,
                Condition::Empty => write!(f, "{} is empty", precondition.path)?,
            }
        }
        write!(f, ")")
    }
}
