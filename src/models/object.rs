//! Represents objects (files) stored in a container.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Name and byte size of one stored object, as shown on the index page.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectSummary {
    pub name: String,
    pub size: u64,
}

impl ObjectSummary {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }
}

/// Metadata row for an object held by the local backend.
///
/// The payload bytes live on disk; this struct only carries what SQLite knows.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct StoredObject {
    /// Internal UUID for DB indexing.
    pub id: Uuid,

    /// Foreign key linking to the parent container.
    pub container_id: Uuid,

    /// Object name (path-like identifier within the container).
    pub name: String,

    /// Size in bytes.
    pub size_bytes: i64,

    /// Hex MD5 of the payload.
    pub etag: Option<String>,

    /// Timestamp when object was last written.
    pub last_modified: DateTime<Utc>,

    /// Whether the object is marked as deleted (soft delete).
    pub is_deleted: bool,
}

impl From<StoredObject> for ObjectSummary {
    fn from(obj: StoredObject) -> Self {
        ObjectSummary {
            name: obj.name,
            size: obj.size_bytes.max(0) as u64,
        }
    }
}
