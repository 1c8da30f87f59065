//! Represents the container row owned by the local backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A storage container in the local backend.
///
/// One process serves exactly one container; the row exists so that object
/// rows have something to hang off and so a database can be shared by several
/// deployments pointing at different containers.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct ContainerRecord {
    /// Internal UUID for DB indexing.
    pub id: Uuid,

    /// Container name (same naming rules as S3 buckets).
    pub name: String,

    /// When this container was first opened.
    pub created_at: DateTime<Utc>,
}
