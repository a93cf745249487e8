use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored user record.
///
/// `id` and `created_on` are assigned by the store at insert time and are
/// never settable by callers; the only way in is through [`NewUser`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub created_on: DateTime<Utc>,
    pub name: String,
}

/// Caller-writable part of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewUser {
    pub name: String,
}

impl NewUser {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl User {
    /// Builds the stored form of `new`. Only stores call this, once they have
    /// allocated an id and a creation time.
    #[must_use]
    pub fn from_new(id: i64, created_on: DateTime<Utc>, new: NewUser) -> Self {
        Self {
            id,
            created_on,
            name: new.name,
        }
    }
}
