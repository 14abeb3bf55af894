//! Stable objective identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of an objective, derived from its configuration rather than from
/// the address of the scorer, so it survives cloning and deserialization.
///
/// `kind` names the criterion family (e.g. `"line"`, `"branch"`,
/// `"suite-coverage"`); `key` names the concrete goal or instance inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectiveId {
    kind: String,
    key: String,
}

impl ObjectiveId {
    pub fn new(kind: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            key: key.into(),
        }
    }

    /// Criterion family this objective belongs to.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_kind(&self, kind: &str) -> bool {
        self.kind == kind
    }
}

impl fmt::Display for ObjectiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.key)
    }
}
