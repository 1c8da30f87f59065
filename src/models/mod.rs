//! Data models shared by the listing core, the storage backends and the views.
//!
//! `ObjectSummary`, `ContinuationToken` and `ListPage` are transient values
//! produced per request. `ContainerRecord` and `StoredObject` map to the
//! SQLite tables of the local backend via `sqlx::FromRow`.

pub mod container;
pub mod object;
pub mod page;
