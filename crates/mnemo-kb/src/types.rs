//! Core data types for the knowledge-base metadata model.
//!
//! A **record** ([`VectorStoreRecord`]) is the metadata unit for one
//! knowledge-base collection; it may or may not have a live counterpart in
//! the external search provider ([`SyncState`]). Files are exclusively
//! owned by one record via `parent_store_id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reserved system identity: owns company-tier records, acts as the admin
/// identity for seeding and for the lifecycle coordinator's cascades.
pub const SYSTEM_OWNER_ID: &str = "system";

/// Storage tier of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Admin-seeded, shared, read-only for everyone but the system identity.
    Company,
    /// User-owned, persistent, created by explicit command.
    Personal,
    /// Auto-managed, ephemeral, bound 1:1 to a conversation thread.
    Session,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Company => write!(f, "company"),
            Self::Personal => write!(f, "personal"),
            Self::Session => write!(f, "session"),
        }
    }
}

impl Tier {
    /// Parse from string, defaulting unknown values to Personal.
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "company" => Self::Company,
            "session" => Self::Session,
            _ => Self::Personal,
        }
    }
}

/// Whether a record has a live counterpart in the external provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// Not yet provisioned remotely.
    Unsynced,
    /// Remote counterpart exists and matches local metadata.
    Synced,
    /// No remote counterpart exists; all operations stay local. Terminal.
    LocalOnly,
    /// Remote counterpart exists but may be out of date; local copy is
    /// authoritative.
    Stale,
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unsynced => write!(f, "unsynced"),
            Self::Synced => write!(f, "synced"),
            Self::LocalOnly => write!(f, "local_only"),
            Self::Stale => write!(f, "stale"),
        }
    }
}

impl SyncState {
    /// Parse from string, defaulting unknown values to LocalOnly (the
    /// safest state: never contact the provider for it).
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "unsynced" => Self::Unsynced,
            "synced" => Self::Synced,
            "stale" => Self::Stale,
            _ => Self::LocalOnly,
        }
    }
}

/// Ingestion status of a record, derived from its file counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreStatus {
    /// Files still being ingested (or no files yet).
    Pending,
    /// All files ingested.
    Completed,
    /// At least one file failed ingestion.
    Failed,
}

impl std::fmt::Display for StoreStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl StoreStatus {
    /// Parse from string, defaulting unknown values to Pending.
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

/// Ingestion status of a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    /// Upload accepted, ingestion not finished.
    InProgress,
    /// Ingested (locally, and remotely when synced).
    Completed,
    /// Ingestion failed.
    Failed,
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl FileStatus {
    /// Parse from string, defaulting unknown values to Failed.
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "in_progress" => Self::InProgress,
            "completed" => Self::Completed,
            _ => Self::Failed,
        }
    }
}

/// Enumerated category tags for personal/session records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Uncategorized knowledge.
    General,
    /// Reference knowledge.
    Knowledge,
    /// Design / architecture material.
    Blueprint,
    /// Plans and approaches.
    Strategy,
    /// Reusable patterns.
    Pattern,
    /// Error diagnoses and fixes.
    ErrorFix,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::General => write!(f, "general"),
            Self::Knowledge => write!(f, "knowledge"),
            Self::Blueprint => write!(f, "blueprint"),
            Self::Strategy => write!(f, "strategy"),
            Self::Pattern => write!(f, "pattern"),
            Self::ErrorFix => write!(f, "error_fix"),
        }
    }
}

impl Category {
    /// Strict parse; `None` for anything outside the tag set.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "general" => Some(Self::General),
            "knowledge" => Some(Self::Knowledge),
            "blueprint" => Some(Self::Blueprint),
            "strategy" => Some(Self::Strategy),
            "pattern" => Some(Self::Pattern),
            "error_fix" => Some(Self::ErrorFix),
            _ => None,
        }
    }
}

/// Visibility policy of a record.
///
/// Currently a single mode: mutations are restricted to the owner while
/// anyone presenting the exact id may read. Kept as an enum so additional
/// modes can be stored without a schema change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Owner-private for mutation, world-readable by exact id.
    #[default]
    Private,
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Private => write!(f, "private"),
        }
    }
}

/// Aggregate file counts for one record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCounts {
    /// All files owned by the record.
    pub total: u32,
    /// Files still being ingested.
    pub in_progress: u32,
    /// Files ingested successfully.
    pub completed: u32,
    /// Files that failed ingestion.
    pub failed: u32,
}

impl FileCounts {
    /// Record-level status implied by these counts.
    pub fn derive_status(&self) -> StoreStatus {
        if self.failed > 0 {
            StoreStatus::Failed
        } else if self.in_progress > 0 || self.total == 0 {
            StoreStatus::Pending
        } else {
            StoreStatus::Completed
        }
    }
}

/// Capability set granted to a requester for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// May read metadata and use the record for retrieval.
    pub read: bool,
    /// May rename, recategorize, and add/remove files.
    pub modify: bool,
    /// May delete the record.
    pub delete: bool,
}

impl Capabilities {
    /// Full `{read, modify, delete}`.
    pub const fn full() -> Self {
        Self {
            read: true,
            modify: true,
            delete: true,
        }
    }

    /// `{read}` only.
    pub const fn read_only() -> Self {
        Self {
            read: true,
            modify: false,
            delete: false,
        }
    }
}

/// Metadata for one knowledge-base collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreRecord {
    /// Unique record id (locally generated; the provider-assigned id, when
    /// one exists, lives in `remote_id`).
    pub id: String,
    /// Owning identity; [`SYSTEM_OWNER_ID`] for company tier.
    pub owner_id: String,
    /// Storage tier.
    pub tier: Tier,
    /// Display name.
    pub name: String,
    /// Category tag (personal/session records; company seeds may carry one).
    pub category: Option<Category>,
    /// Visibility policy.
    pub visibility: Visibility,
    /// Ingestion status derived from file counts.
    pub status: StoreStatus,
    /// Aggregate file counts.
    pub file_counts: FileCounts,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Bound conversation thread (session tier only, set once).
    pub thread_id: Option<String>,
    /// Synchronization state against the external provider.
    pub sync_state: SyncState,
    /// Provider-assigned id of the remote counterpart, when synced.
    pub remote_id: Option<String>,
}

fn new_record_id() -> String {
    format!("vs_{}", Uuid::new_v4().simple())
}

impl VectorStoreRecord {
    /// New personal-tier record for a human owner.
    pub fn new_personal(owner_id: &str, name: &str, category: Option<Category>) -> Self {
        Self {
            id: new_record_id(),
            owner_id: owner_id.to_string(),
            tier: Tier::Personal,
            name: name.to_string(),
            category,
            visibility: Visibility::Private,
            status: StoreStatus::Pending,
            file_counts: FileCounts::default(),
            created_at: Utc::now(),
            thread_id: None,
            sync_state: SyncState::Unsynced,
            remote_id: None,
        }
    }

    /// New session-tier record bound to a conversation thread.
    pub fn new_session(owner_id: &str, thread_id: &str) -> Self {
        Self {
            id: new_record_id(),
            owner_id: owner_id.to_string(),
            tier: Tier::Session,
            name: format!("session-{thread_id}"),
            category: Some(Category::General),
            visibility: Visibility::Private,
            status: StoreStatus::Pending,
            file_counts: FileCounts::default(),
            created_at: Utc::now(),
            thread_id: Some(thread_id.to_string()),
            sync_state: SyncState::Unsynced,
            remote_id: None,
        }
    }

    /// New company-tier record from a seed. The id is the stable seed id
    /// so repeated seeding is idempotent.
    pub fn new_company(seed_id: &str, name: &str, category: Option<Category>) -> Self {
        Self {
            id: seed_id.to_string(),
            owner_id: SYSTEM_OWNER_ID.to_string(),
            tier: Tier::Company,
            name: name.to_string(),
            category,
            visibility: Visibility::Private,
            status: StoreStatus::Pending,
            file_counts: FileCounts::default(),
            created_at: Utc::now(),
            thread_id: None,
            sync_state: SyncState::Unsynced,
            remote_id: None,
        }
    }
}

/// Metadata for one file, exclusively owned by one record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    /// Unique file id (locally generated).
    pub id: String,
    /// Record this file belongs to.
    pub parent_store_id: String,
    /// Original filename.
    pub filename: String,
    /// Content size in bytes.
    pub size_bytes: u64,
    /// Upload purpose tag (e.g. "assistants").
    pub purpose: String,
    /// Ingestion status.
    pub status: FileStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Provider-assigned file id, present iff synced remotely.
    pub remote_file_id: Option<String>,
}

impl FileRecord {
    /// New file record in `InProgress` state.
    pub fn new(parent_store_id: &str, filename: &str, purpose: &str, size_bytes: u64) -> Self {
        Self {
            id: format!("file_{}", Uuid::new_v4().simple()),
            parent_store_id: parent_store_id.to_string(),
            filename: filename.to_string(),
            size_bytes,
            purpose: purpose.to_string(),
            status: FileStatus::InProgress,
            created_at: Utc::now(),
            remote_file_id: None,
        }
    }
}
