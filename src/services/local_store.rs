//! src/services/local_store.rs
//!
//! LocalStore — a single-container blob backend with SQLite metadata and
//! on-disk payloads sharded beneath
//! `base_path/{container}/{shard}/{shard}/{name}`. Used for development and
//! tests, and for deployments that have no cloud account.

use crate::{
    models::{
        container::ContainerRecord,
        object::{ObjectSummary, StoredObject},
        page::{ContinuationToken, ListPage},
    },
    services::backend::{BlobBackend, StorageError, StorageResult},
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use sqlx::{QueryBuilder, SqlitePool, sqlite::Sqlite};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

const MIGRATION_SQL: &str = include_str!("../../migrations/0001_init.sql");

const MAX_OBJECT_NAME_LEN: usize = 1024;
/// Upper bound on rows fetched for one listing page.
pub const MAX_PAGE_SIZE: usize = 5000;
const CONTAINER_NAME_MIN_LEN: usize = 3;
const CONTAINER_NAME_MAX_LEN: usize = 63;

/// LocalStore keeps one container's objects on the local machine.
///
/// Cloning is cheap; the pool is shared.
#[derive(Clone)]
pub struct LocalStore {
    /// Shared SQLite connection pool used for metadata operations.
    pub db: Arc<SqlitePool>,

    /// Base directory on disk where object payloads are stored.
    pub base_path: PathBuf,

    /// The container row this store serves.
    container: ContainerRecord,

    /// Maximum number of objects returned per listing page.
    page_size: usize,
}

impl LocalStore {
    /// Open the container `name`, creating its row and directory if they do
    /// not exist yet. The schema must already be applied (see [`migrate`]).
    pub async fn open(
        db: Arc<SqlitePool>,
        base_path: impl Into<PathBuf>,
        name: &str,
        page_size: usize,
    ) -> StorageResult<Self> {
        ensure_container_name_safe(name)?;
        let base_path = base_path.into();

        sqlx::query(
            "INSERT INTO containers (id, name, created_at) VALUES (?, ?, ?)
             ON CONFLICT(name) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(Utc::now())
        .execute(&*db)
        .await?;

        let container = sqlx::query_as::<Sqlite, ContainerRecord>(
            "SELECT id, name, created_at FROM containers WHERE name = ?",
        )
        .bind(name)
        .fetch_one(&*db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => StorageError::ContainerNotFound(name.to_string()),
            other => StorageError::Sqlx(other),
        })?;

        let store = Self {
            db,
            base_path,
            container,
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        };
        fs::create_dir_all(store.container_root()).await?;
        debug!(
            "opened local container {} at {}",
            store.container.name,
            store.container_root().display()
        );
        Ok(store)
    }

    /// Compute the physical base folder path for the container.
    fn container_root(&self) -> PathBuf {
        self.base_path.join(&self.container.name)
    }

    /// Generate two-level shard identifiers for an object name.
    ///
    /// Uses MD5(container/name) and returns the first two bytes as lowercase
    /// hexadecimal strings (00–ff). Reduces file count per directory.
    fn object_shards(container: &str, name: &str) -> (String, String) {
        let digest = md5::compute(format!("{}/{}", container, name));
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    /// Construct a fully-qualified object payload path.
    fn object_path(&self, name: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::object_shards(&self.container.name, name);
        let mut path = self.container_root();
        path.push(shard_a);
        path.push(shard_b);
        path.push(name);
        path
    }

    /// Fetch a non-deleted object metadata record.
    async fn fetch_object(&self, name: &str) -> StorageResult<StoredObject> {
        sqlx::query_as::<_, StoredObject>(
            "SELECT id, container_id, name, size_bytes, etag, last_modified, is_deleted
             FROM objects
             WHERE name = ? AND container_id = ? AND is_deleted = 0",
        )
        .bind(name)
        .bind(self.container.id)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => StorageError::ObjectNotFound(name.to_string()),
            other => StorageError::Sqlx(other),
        })
    }

    /// Write the payload to a temp file next to its final location, fsync it
    /// and rename it into place.
    async fn write_payload(&self, file_path: &Path, bytes: &[u8]) -> StorageResult<()> {
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            StorageError::Io(io::Error::new(
                ErrorKind::Other,
                "object path missing parent directory",
            ))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));

        let written = async {
            let mut file = File::create(&tmp_path).await?;
            file.write_all(bytes).await?;
            file.flush().await?;
            file.sync_all().await
        }
        .await;
        if let Err(err) = written {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }

        if let Err(err) = fs::rename(&tmp_path, file_path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(file_path).await?;
                fs::rename(&tmp_path, file_path).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StorageError::Io(err));
            }
        }
        Ok(())
    }

    /// Recursively remove empty directories up to the container root.
    async fn prune_empty_dirs(&self, start: &Path, stop: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => {
                    if let Some(parent) = current.parent() {
                        current = parent.to_path_buf();
                    } else {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl BlobBackend for LocalStore {
    /// Names are returned in ascending byte order; the cursor is the last name
    /// of the previous page.
    async fn list_page(&self, token: &ContinuationToken) -> StorageResult<ListPage> {
        if !token.has_more() {
            return Ok(ListPage::done());
        }
        let fetch_limit = self.page_size + 1;

        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT id, container_id, name, size_bytes, etag, last_modified, is_deleted \
             FROM objects WHERE container_id = ",
        );
        builder.push_bind(self.container.id);
        builder.push(" AND is_deleted = 0");
        if let Some(after) = token.marker() {
            builder.push(" AND name > ");
            builder.push_bind(after.to_string());
        }
        builder.push(" ORDER BY name ASC LIMIT ");
        builder.push_bind(fetch_limit as i64);

        let mut rows: Vec<StoredObject> = builder.build_query_as().fetch_all(&*self.db).await?;

        let mut next = ContinuationToken::Done;
        if rows.len() == fetch_limit {
            rows.pop();
            if let Some(last) = rows.last() {
                next = ContinuationToken::Next(last.name.clone());
            }
        }

        let items = rows.into_iter().map(ObjectSummary::from).collect();
        Ok(ListPage::new(items, next))
    }

    /// Upserts the metadata row (overwrite semantics) after the payload is on
    /// disk. The payload is removed again if the row cannot be written.
    async fn upload_object(&self, name: &str, bytes: Bytes) -> StorageResult<()> {
        ensure_name_safe(name)?;
        let file_path = self.object_path(name);
        self.write_payload(&file_path, &bytes).await?;

        let etag = format!("{:x}", md5::compute(&bytes));
        let insert_result = sqlx::query(
            r#"
            INSERT INTO objects (
                id, container_id, name, size_bytes, etag, last_modified, is_deleted
            ) VALUES (?, ?, ?, ?, ?, ?, 0)
            ON CONFLICT(container_id, name) DO UPDATE SET
                size_bytes = excluded.size_bytes,
                etag = excluded.etag,
                last_modified = excluded.last_modified,
                is_deleted = 0
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(self.container.id)
        .bind(name)
        .bind(bytes.len() as i64)
        .bind(&etag)
        .bind(Utc::now())
        .execute(&*self.db)
        .await;

        match insert_result {
            Ok(_) => {
                debug!("stored {} ({} bytes, etag {})", name, bytes.len(), etag);
                Ok(())
            }
            Err(err) => {
                let _ = fs::remove_file(&file_path).await;
                Err(StorageError::Sqlx(err))
            }
        }
    }

    /// Soft-delete the row, remove the payload and prune empty shard
    /// directories. Deleting an absent object returns `ObjectNotFound`.
    async fn delete_object(&self, name: &str) -> StorageResult<()> {
        ensure_name_safe(name)?;
        self.fetch_object(name).await?;

        let result =
            sqlx::query("UPDATE objects SET is_deleted = 1 WHERE name = ? AND container_id = ?")
                .bind(name)
                .bind(self.container.id)
                .execute(&*self.db)
                .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::ObjectNotFound(name.to_string()));
        }

        let file_path = self.object_path(name);
        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed physical file {}", file_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("file {} already missing", file_path.display());
            }
            Err(err) => return Err(StorageError::Io(err)),
        }

        if let Some(parent) = file_path.parent() {
            self.prune_empty_dirs(parent, &self.container_root()).await;
        }
        Ok(())
    }

    /// Runs `SELECT 1` and a write/read/delete round trip under the container
    /// directory.
    async fn check_ready(&self) -> StorageResult<()> {
        let one = sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        if one != 1 {
            return Err(StorageError::Backend(format!(
                "unexpected SELECT 1 result: {}",
                one
            )));
        }

        let canary = self.container_root().join(format!(".readyz-{}", Uuid::new_v4()));
        fs::write(&canary, b"readyz").await?;
        let read_back = fs::read(&canary).await;
        let _ = fs::remove_file(&canary).await;
        if read_back? != b"readyz" {
            return Err(StorageError::Backend("readiness file content mismatch".into()));
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("local:{}", self.container.name)
    }
}

/// Apply the embedded schema. Statements are split on `;` and executed one by
/// one; every statement is idempotent.
pub async fn migrate(db: &SqlitePool) -> StorageResult<()> {
    let statements = MIGRATION_SQL
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    tracing::info!("Running {} migration statements...", statements.len());
    for stmt in statements {
        debug!("Executing migration SQL: {}", stmt);
        sqlx::query(stmt).execute(db).await?;
    }
    Ok(())
}

/// Basic name validation to avoid trivial path traversal vectors.
///
/// Rejects names that are empty, overly long, contain `..`, control
/// characters or backslashes, or have an empty or `.` path segment (which
/// covers leading, trailing and doubled slashes).
pub fn ensure_name_safe(name: &str) -> StorageResult<()> {
    if name.is_empty() || name.len() > MAX_OBJECT_NAME_LEN {
        return Err(StorageError::InvalidObjectName);
    }
    if name.contains("..")
        || name
            .split('/')
            .any(|segment| segment.is_empty() || segment == ".")
    {
        return Err(StorageError::InvalidObjectName);
    }
    if name
        .bytes()
        .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
    {
        return Err(StorageError::InvalidObjectName);
    }
    Ok(())
}

/// Validate container name format.
///
/// Enforces S3-like naming rules:
/// - 3–63 characters
/// - lowercase letters, digits, dots, hyphens only
/// - cannot start/end with dot or hyphen
/// - cannot contain consecutive dots or dot-hyphen patterns
/// - cannot look like an IPv4 address
pub fn ensure_container_name_safe(name: &str) -> StorageResult<()> {
    let invalid = |reason: &str| StorageError::InvalidContainerName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    let len = name.len();
    if len < CONTAINER_NAME_MIN_LEN || len > CONTAINER_NAME_MAX_LEN {
        return Err(invalid("must be between 3 and 63 characters"));
    }

    if !name
        .chars()
        .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '-'))
    {
        return Err(invalid(
            "allowed characters are lowercase letters, digits, dots, and hyphens",
        ));
    }

    if name.starts_with(['.', '-']) || name.ends_with(['.', '-']) {
        return Err(invalid("must start and end with a lowercase letter or digit"));
    }

    if name.contains("..") || name.contains("-.") || name.contains(".-") {
        return Err(invalid(
            "cannot contain consecutive dots or dot-hyphen combinations",
        ));
    }

    if is_ipv4_like(name) {
        return Err(invalid("must not be formatted like an IP address"));
    }

    Ok(())
}

/// Check if a string matches IPv4-like dotted decimal form.
fn is_ipv4_like(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() == 4
        && parts.iter().all(|segment| {
            !segment.is_empty()
                && segment.len() <= 3
                && segment.chars().all(|c| c.is_ascii_digit())
                && segment.parse::<u8>().is_ok()
        })
}
