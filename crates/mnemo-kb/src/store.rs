//! MetadataStore — SQLite persistence for records and files.
//!
//! Tables: `vector_stores`, `store_files`. This is the system of record
//! whenever the external provider is unavailable or unsynced, so
//! everything written here must survive a process restart.
//!
//! There is deliberately no list-all operation: the only cross-owner rows
//! `list_by_owner` ever returns are company-tier ones. The non-listing
//! half of the privacy invariant is enforced here, at the data-access
//! layer, not in a higher-level filter.

use crate::error::{Error, Result};
use crate::types::{
    Category, FileCounts, FileRecord, FileStatus, StoreStatus, SyncState, Tier, VectorStoreRecord,
    Visibility,
};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::{debug, info};

/// SQLite-backed metadata store.
#[derive(Clone)]
pub struct MetadataStore {
    pool: SqlitePool,
}

impl MetadataStore {
    /// Open (or create) a metadata store at the given path.
    pub async fn from_path(db_path: &std::path::Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::Internal(format!("mkdir: {e}")))?;
        }
        let url = format!("sqlite:{}?mode=rwc", db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        // Enable WAL for read/write concurrency
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&pool)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("Metadata store initialized at {}", db_path.display());
        Ok(store)
    }

    /// In-memory store (for tests).
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self { pool };
        store.run_migrations().await?;
        debug!("In-memory metadata store initialized");
        Ok(store)
    }

    // ── Migrations ──────────────────────────────────────────────

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS vector_stores (
                id          TEXT PRIMARY KEY,
                owner_id    TEXT NOT NULL,
                tier        TEXT NOT NULL,
                name        TEXT NOT NULL,
                category    TEXT,
                visibility  TEXT NOT NULL,
                status      TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                thread_id   TEXT UNIQUE,
                sync_state  TEXT NOT NULL,
                remote_id   TEXT
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_stores_owner
             ON vector_stores(owner_id, tier)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS store_files (
                id              TEXT PRIMARY KEY,
                parent_store_id TEXT NOT NULL REFERENCES vector_stores(id),
                filename        TEXT NOT NULL,
                size_bytes      INTEGER NOT NULL,
                purpose         TEXT NOT NULL,
                status          TEXT NOT NULL,
                created_at      TEXT NOT NULL,
                remote_file_id  TEXT
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_files_parent
             ON store_files(parent_store_id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ── Records ─────────────────────────────────────────────────

    /// Insert or update a record by id.
    pub async fn put(&self, record: &VectorStoreRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO vector_stores
             (id, owner_id, tier, name, category, visibility, status,
              created_at, thread_id, sync_state, remote_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(id) DO UPDATE SET
                name       = excluded.name,
                category   = excluded.category,
                status     = excluded.status,
                sync_state = excluded.sync_state,
                remote_id  = excluded.remote_id",
        )
        .bind(&record.id)
        .bind(&record.owner_id)
        .bind(record.tier.to_string())
        .bind(&record.name)
        .bind(record.category.map(|c| c.to_string()))
        .bind(record.visibility.to_string())
        .bind(record.status.to_string())
        .bind(record.created_at.to_rfc3339())
        .bind(&record.thread_id)
        .bind(record.sync_state.to_string())
        .bind(&record.remote_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get a record by id.
    pub async fn get(&self, id: &str) -> Result<Option<VectorStoreRecord>> {
        let row = sqlx::query(
            "SELECT id, owner_id, tier, name, category, visibility, status,
                    created_at, thread_id, sync_state, remote_id
             FROM vector_stores WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_record).transpose()
    }

    /// Get the session record bound to a thread, if any.
    pub async fn get_by_thread(&self, thread_id: &str) -> Result<Option<VectorStoreRecord>> {
        let row = sqlx::query(
            "SELECT id, owner_id, tier, name, category, visibility, status,
                    created_at, thread_id, sync_state, remote_id
             FROM vector_stores WHERE thread_id = ?1",
        )
        .bind(thread_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_record).transpose()
    }

    /// Delete a record and all files it owns. No-op if absent.
    pub async fn delete(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM store_files WHERE parent_store_id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM vector_stores WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Records visible in a listing for `owner_id`: their own records plus
    /// the shared company tier. Never anyone else's, whatever the filters.
    pub async fn list_by_owner(
        &self,
        owner_id: &str,
        tier: Option<Tier>,
        category: Option<Category>,
    ) -> Result<Vec<VectorStoreRecord>> {
        let rows = sqlx::query(
            "SELECT id, owner_id, tier, name, category, visibility, status,
                    created_at, thread_id, sync_state, remote_id
             FROM vector_stores
             WHERE owner_id = ?1 OR tier = 'company'
             ORDER BY created_at, id",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        let records: Result<Vec<_>> = rows.iter().map(Self::row_to_record).collect();
        Ok(records?
            .into_iter()
            .filter(|r| tier.is_none_or(|t| r.tier == t))
            .filter(|r| category.is_none_or(|c| r.category == Some(c)))
            .collect())
    }

    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<VectorStoreRecord> {
        let tier_str: String = row.try_get("tier")?;
        let status_str: String = row.try_get("status")?;
        let sync_str: String = row.try_get("sync_state")?;
        let category_str: Option<String> = row.try_get("category")?;
        let created_str: String = row.try_get("created_at")?;
        Ok(VectorStoreRecord {
            id: row.try_get("id")?,
            owner_id: row.try_get("owner_id")?,
            tier: Tier::from_str_lossy(&tier_str),
            name: row.try_get("name")?,
            category: category_str.as_deref().and_then(Category::parse),
            visibility: Visibility::Private,
            status: StoreStatus::from_str_lossy(&status_str),
            // Recomputed from the files table on demand; kept current on
            // the struct by the facade after every file mutation.
            file_counts: FileCounts::default(),
            created_at: DateTime::parse_from_rfc3339(&created_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            thread_id: row.try_get("thread_id")?,
            sync_state: SyncState::from_str_lossy(&sync_str),
            remote_id: row.try_get("remote_id")?,
        })
    }

    /// Get a record with its file counts populated.
    pub async fn get_with_counts(&self, id: &str) -> Result<Option<VectorStoreRecord>> {
        let Some(mut record) = self.get(id).await? else {
            return Ok(None);
        };
        record.file_counts = self.file_counts(id).await?;
        Ok(Some(record))
    }

    // ── Files ───────────────────────────────────────────────────

    /// Insert or update a file row.
    pub async fn put_file(&self, file: &FileRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO store_files
             (id, parent_store_id, filename, size_bytes, purpose, status,
              created_at, remote_file_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
                status         = excluded.status,
                remote_file_id = excluded.remote_file_id",
        )
        .bind(&file.id)
        .bind(&file.parent_store_id)
        .bind(&file.filename)
        .bind(file.size_bytes as i64)
        .bind(&file.purpose)
        .bind(file.status.to_string())
        .bind(file.created_at.to_rfc3339())
        .bind(&file.remote_file_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get a file by id.
    pub async fn get_file(&self, file_id: &str) -> Result<Option<FileRecord>> {
        let row = sqlx::query(
            "SELECT id, parent_store_id, filename, size_bytes, purpose, status,
                    created_at, remote_file_id
             FROM store_files WHERE id = ?1",
        )
        .bind(file_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_file).transpose()
    }

    /// Delete a file row. No-op if absent.
    pub async fn delete_file(&self, file_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM store_files WHERE id = ?1")
            .bind(file_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// All files owned by a record, oldest first.
    pub async fn files_for_store(&self, store_id: &str) -> Result<Vec<FileRecord>> {
        let rows = sqlx::query(
            "SELECT id, parent_store_id, filename, size_bytes, purpose, status,
                    created_at, remote_file_id
             FROM store_files WHERE parent_store_id = ?1
             ORDER BY created_at, id",
        )
        .bind(store_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_file).collect()
    }

    /// Aggregate file counts for a record, recomputed from the files table.
    pub async fn file_counts(&self, store_id: &str) -> Result<FileCounts> {
        let rows = sqlx::query(
            "SELECT status, COUNT(*) as cnt
             FROM store_files WHERE parent_store_id = ?1
             GROUP BY status",
        )
        .bind(store_id)
        .fetch_all(&self.pool)
        .await?;

        let mut counts = FileCounts::default();
        for row in &rows {
            let status: String = row.try_get("status")?;
            let cnt: i32 = row.try_get("cnt")?;
            let cnt = cnt as u32;
            counts.total += cnt;
            match FileStatus::from_str_lossy(&status) {
                FileStatus::InProgress => counts.in_progress += cnt,
                FileStatus::Completed => counts.completed += cnt,
                FileStatus::Failed => counts.failed += cnt,
            }
        }
        Ok(counts)
    }

    fn row_to_file(row: &sqlx::sqlite::SqliteRow) -> Result<FileRecord> {
        let status_str: String = row.try_get("status")?;
        let created_str: String = row.try_get("created_at")?;
        Ok(FileRecord {
            id: row.try_get("id")?,
            parent_store_id: row.try_get("parent_store_id")?,
            filename: row.try_get("filename")?,
            size_bytes: row.try_get::<i64, _>("size_bytes")? as u64,
            purpose: row.try_get("purpose")?,
            status: FileStatus::from_str_lossy(&status_str),
            created_at: DateTime::parse_from_rfc3339(&created_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            remote_file_id: row.try_get("remote_file_id")?,
        })
    }

    // ── Stats ───────────────────────────────────────────────────

    /// Total number of records stored.
    pub async fn record_count(&self) -> Result<u32> {
        let row = sqlx::query("SELECT COUNT(*) as cnt FROM vector_stores")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i32, _>("cnt")? as u32)
    }
}
