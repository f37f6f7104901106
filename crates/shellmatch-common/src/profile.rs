use serde::{Deserialize, Serialize};
use std::fmt;

/// Mint a fresh player id.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A registered player identity: opaque unique id plus display name.
///
/// Immutable once assigned. Registration happens upstream of the
/// matchmaking socket; connections arrive already carrying their profile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub name: String,
}

impl Profile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.id)
    }
}
