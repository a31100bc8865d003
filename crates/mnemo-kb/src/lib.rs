//! Mnemo KB — knowledge-base metadata and lifecycle manager.
//!
//! Tracks knowledge-base collections ("vector stores") that may or may not
//! exist in an external semantic-search provider, enforces per-record
//! ownership, classifies records into three tiers with different
//! creation/deletion semantics, and cascades deletion of session records
//! when their conversation thread dies. Degrades to a pure local mode when
//! the provider capability is absent or fails.
//!
//! # Architecture
//!
//! ```text
//! create / upload ──► TierManager ──► SyncEngine ──► provider (optional)
//!                          │               │
//!                          └──► MetadataStore (SQLite)
//!                                     ▲
//! reads / mutations ──► OwnershipGuard┘
//!
//! thread deleted ──► LifecycleCoordinator ──► SyncEngine + MetadataStore
//! ```
//!
//! Local state is authoritative: remote failures are absorbed into sync
//! states (stale / local_only), local persistence failures always surface.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod conversation;
pub mod error;
pub mod guard;
pub mod lifecycle;
pub mod locks;
pub mod retry;
pub mod store;
pub mod sync;
pub mod tiers;
pub mod types;

pub use config::{seeds_from_json, seeds_from_path, CompanySeed, KnowledgeBaseConfig};
pub use conversation::{ConversationStore, ThreadEvent};
pub use error::{Error, Result};
pub use lifecycle::LifecycleCoordinator;
pub use retry::RetryConfig;
pub use store::MetadataStore;
pub use sync::SyncEngine;
pub use tiers::TierManager;
pub use types::{
    Capabilities, Category, FileCounts, FileRecord, FileStatus, StoreStatus, SyncState, Tier,
    VectorStoreRecord, Visibility, SYSTEM_OWNER_ID,
};

use crate::locks::KeyLocks;
use mnemo_provider::SearchProvider;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

/// Default purpose tag for uploaded files.
const UPLOAD_PURPOSE: &str = "assistants";

/// High-level facade combining the store, sync engine, tier policy, and
/// lifecycle coordination.
///
/// All mutating operations on one record id are serialized through a
/// per-key lock; operations on distinct ids run fully in parallel. No
/// lock spans more than one record.
pub struct KnowledgeBase {
    store: MetadataStore,
    sync: Arc<SyncEngine>,
    tiers: TierManager,
    lifecycle: Arc<LifecycleCoordinator>,
    record_locks: Arc<KeyLocks>,
}

impl KnowledgeBase {
    /// Open (or create) a knowledge base per config.
    ///
    /// `provider` is the optional external search provider; `conversations`
    /// the optional conversation-persistence collaborator.
    pub async fn open(
        config: &KnowledgeBaseConfig,
        provider: Option<Arc<dyn SearchProvider>>,
        conversations: Option<Arc<dyn ConversationStore>>,
    ) -> Result<Self> {
        let store = MetadataStore::from_path(&config.db_path).await?;
        Ok(Self::assemble(store, config, provider, conversations))
    }

    /// In-memory knowledge base (useful for tests).
    pub async fn in_memory(provider: Option<Arc<dyn SearchProvider>>) -> Result<Self> {
        let store = MetadataStore::in_memory().await?;
        Ok(Self::assemble(
            store,
            &KnowledgeBaseConfig::default(),
            provider,
            None,
        ))
    }

    fn assemble(
        store: MetadataStore,
        config: &KnowledgeBaseConfig,
        provider: Option<Arc<dyn SearchProvider>>,
        conversations: Option<Arc<dyn ConversationStore>>,
    ) -> Self {
        let sync = Arc::new(match provider {
            Some(provider) => SyncEngine::new(provider, config.retry_config())
                .with_remote_timeout(config.remote_timeout()),
            None => SyncEngine::local_only(),
        });
        let record_locks = Arc::new(KeyLocks::new());
        let tiers = TierManager::new(store.clone(), sync.clone(), conversations);
        let lifecycle = Arc::new(LifecycleCoordinator::new(
            store.clone(),
            sync.clone(),
            record_locks.clone(),
        ));
        Self {
            store,
            sync,
            tiers,
            lifecycle,
            record_locks,
        }
    }

    // ── Seeding ─────────────────────────────────────────────────

    /// Seed the company tier from configuration. Administrative path, run
    /// once at process start. Returns the number of newly seeded records.
    pub async fn seed_company(&self, seeds: &[CompanySeed]) -> Result<usize> {
        self.tiers.seed_company(seeds).await
    }

    // ── Creation ────────────────────────────────────────────────

    /// Create a record of the requested tier by user command.
    ///
    /// Only the personal tier is user-creatable; company targets get
    /// `PermissionDenied`, session targets `InvalidArgument`.
    pub async fn create_store(
        &self,
        owner_id: &str,
        tier: Tier,
        name: &str,
        category: Option<&str>,
    ) -> Result<String> {
        TierManager::check_user_creatable(tier)?;
        self.create_personal(owner_id, name, category).await
    }

    /// Create a personal record; returns its id.
    pub async fn create_personal(
        &self,
        owner_id: &str,
        name: &str,
        category: Option<&str>,
    ) -> Result<String> {
        let category = parse_category(category)?;
        let record = self.tiers.create_personal(owner_id, name, category).await?;
        Ok(record.id)
    }

    /// Get or create the session record bound to a thread; returns its id.
    pub async fn get_or_create_session(&self, thread_id: &str, owner_id: &str) -> Result<String> {
        let record = self
            .tiers
            .get_or_create_for_thread(thread_id, owner_id)
            .await?;
        Ok(record.id)
    }

    /// Upload entry point: binds the thread to a session record (creating
    /// one if needed) and attaches the file. Returns (record id, file id).
    pub async fn handle_upload(
        &self,
        thread_id: &str,
        owner_id: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<(String, String)> {
        let store_id = self.get_or_create_session(thread_id, owner_id).await?;
        let file_id = self
            .add_file(owner_id, &store_id, filename, UPLOAD_PURPOSE, bytes)
            .await?;
        Ok((store_id, file_id))
    }

    // ── Reads ───────────────────────────────────────────────────

    /// Records visible to `owner_id`: their own plus the company tier.
    pub async fn list_owned(
        &self,
        owner_id: &str,
        tier: Option<Tier>,
    ) -> Result<Vec<VectorStoreRecord>> {
        let mut records = self.store.list_by_owner(owner_id, tier, None).await?;
        for record in &mut records {
            record.file_counts = self.store.file_counts(&record.id).await?;
        }
        Ok(records)
    }

    /// Fetch a record by exact id, as any identity.
    ///
    /// Strangers get the record read-only; it never shows up in their
    /// listings, so knowing the id is the whole access token.
    pub async fn use_by_id(&self, requester_id: &str, id: &str) -> Result<VectorStoreRecord> {
        let record = self
            .store
            .get_with_counts(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        if !guard::capabilities(&record, requester_id).read {
            return Err(Error::PermissionDenied);
        }
        Ok(record)
    }

    /// Files attached to a record, oldest first.
    pub async fn list_files(&self, requester_id: &str, store_id: &str) -> Result<Vec<FileRecord>> {
        let record = self
            .store
            .get(store_id)
            .await?
            .ok_or_else(|| Error::NotFound(store_id.to_string()))?;
        if !guard::capabilities(&record, requester_id).read {
            return Err(Error::PermissionDenied);
        }
        self.store.files_for_store(store_id).await
    }

    // ── Mutations ───────────────────────────────────────────────

    /// Rename a record. Owner (or system identity) only.
    pub async fn rename(&self, requester_id: &str, id: &str, new_name: &str) -> Result<()> {
        if new_name.is_empty() {
            return Err(Error::InvalidArgument("name must not be empty".into()));
        }
        let _guard = self.record_locks.acquire(id).await;
        let mut record = self.fetch_for_modify(requester_id, id).await?;

        record.name = new_name.to_string();
        self.sync.push_update(&mut record).await;
        self.store.put(&record).await?;
        Ok(())
    }

    /// Change a record's category tag. Owner (or system identity) only.
    pub async fn recategorize(
        &self,
        requester_id: &str,
        id: &str,
        category: Option<&str>,
    ) -> Result<()> {
        let category = parse_category(category)?;
        let _guard = self.record_locks.acquire(id).await;
        let mut record = self.fetch_for_modify(requester_id, id).await?;

        record.category = category;
        self.store.put(&record).await?;
        Ok(())
    }

    /// Delete a record, remote counterpart included.
    ///
    /// Session records are refused here regardless of requester: their
    /// only deletion path is the thread-deletion cascade.
    pub async fn delete(&self, requester_id: &str, id: &str) -> Result<()> {
        let _guard = self.record_locks.acquire(id).await;
        let record = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        if record.tier == Tier::Session {
            return Err(Error::PermissionDenied);
        }
        if !guard::capabilities(&record, requester_id).delete {
            return Err(Error::PermissionDenied);
        }

        // Remote failure is absorbed; local deletion must not be blocked.
        self.sync.deprovision(&record).await;
        self.store.delete(id).await?;
        info!(id, requester_id, "store deleted");
        Ok(())
    }

    /// Attach a file to a record. Owner (or system identity) only.
    /// Returns the new file id.
    pub async fn add_file(
        &self,
        requester_id: &str,
        store_id: &str,
        filename: &str,
        purpose: &str,
        bytes: &[u8],
    ) -> Result<String> {
        if filename.is_empty() {
            return Err(Error::InvalidArgument("filename must not be empty".into()));
        }
        let _guard = self.record_locks.acquire(store_id).await;
        let mut record = self.fetch_for_modify(requester_id, store_id).await?;

        let mut file = FileRecord::new(store_id, filename, purpose, bytes.len() as u64);
        self.sync.push_file(&mut record, &mut file, bytes).await;
        // Local bookkeeping is the source of truth for ingestion progress;
        // a failed remote attach leaves the record stale, not the file failed.
        file.status = FileStatus::Completed;

        self.store.put_file(&file).await?;
        record.file_counts = self.store.file_counts(store_id).await?;
        record.status = record.file_counts.derive_status();
        self.store.put(&record).await?;
        Ok(file.id)
    }

    /// Detach and delete a file from a record. Owner (or system) only.
    pub async fn remove_file(
        &self,
        requester_id: &str,
        store_id: &str,
        file_id: &str,
    ) -> Result<()> {
        let _guard = self.record_locks.acquire(store_id).await;
        let mut record = self.fetch_for_modify(requester_id, store_id).await?;

        let file = self
            .store
            .get_file(file_id)
            .await?
            .filter(|f| f.parent_store_id == store_id)
            .ok_or_else(|| Error::NotFound(file_id.to_string()))?;

        self.sync.remove_file(&mut record, &file).await;
        self.store.delete_file(file_id).await?;
        record.file_counts = self.store.file_counts(store_id).await?;
        record.status = record.file_counts.derive_status();
        self.store.put(&record).await?;
        Ok(())
    }

    // ── Lifecycle ───────────────────────────────────────────────

    /// Cascade a thread deletion to its bound session record. Idempotent.
    pub async fn on_thread_deleted(&self, thread_id: &str) -> Result<()> {
        self.lifecycle.on_thread_deleted(thread_id).await
    }

    /// Spawn the event-driven lifecycle loop on the given receiver.
    pub fn attach_thread_events(
        &self,
        events: broadcast::Receiver<ThreadEvent>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.lifecycle.clone().run(events))
    }

    // ── Stats ───────────────────────────────────────────────────

    /// Total number of records.
    pub async fn record_count(&self) -> Result<u32> {
        self.store.record_count().await
    }

    /// Whether the provider has been found to lack the capability.
    pub fn provider_capability_absent(&self) -> bool {
        self.sync.capability_absent()
    }

    /// Fetch a record and require modify capability for `requester_id`.
    async fn fetch_for_modify(&self, requester_id: &str, id: &str) -> Result<VectorStoreRecord> {
        let record = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        if !guard::capabilities(&record, requester_id).modify {
            return Err(Error::PermissionDenied);
        }
        Ok(record)
    }
}

/// Validate a caller-supplied category against the enumerated tag set.
fn parse_category(category: Option<&str>) -> Result<Option<Category>> {
    match category {
        None => Ok(None),
        Some(s) => Category::parse(s).map(Some).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "unknown category '{s}' (expected one of: general, knowledge, blueprint, strategy, pattern, error_fix)"
            ))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_provider::MockSearchProvider;

    async fn kb(mock: &MockSearchProvider) -> KnowledgeBase {
        KnowledgeBase::in_memory(Some(Arc::new(mock.clone())))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_store_rejects_non_personal_tiers() {
        let mock = MockSearchProvider::new();
        let kb = kb(&mock).await;

        let err = kb
            .create_store("alice", Tier::Company, "X", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PermissionDenied));

        let err = kb
            .create_store("alice", Tier::Session, "X", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_unknown_category_rejected() {
        let mock = MockSearchProvider::new();
        let kb = kb(&mock).await;
        let err = kb
            .create_personal("alice", "Notes", Some("vibes"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_use_by_id_not_found() {
        let mock = MockSearchProvider::new();
        let kb = kb(&mock).await;
        let err = kb.use_by_id("alice", "vs_nope").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_session_records_not_directly_deletable() {
        let mock = MockSearchProvider::new();
        let kb = kb(&mock).await;
        let id = kb.get_or_create_session("t1", "alice").await.unwrap();

        // Even the owner cannot delete a session record by command.
        let err = kb.delete("alice", &id).await.unwrap_err();
        assert!(matches!(err, Error::PermissionDenied));

        // The thread-deletion cascade is the one sanctioned path.
        kb.on_thread_deleted("t1").await.unwrap();
        assert!(matches!(
            kb.use_by_id("alice", &id).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_file_checks_parent() {
        let mock = MockSearchProvider::new();
        let kb = kb(&mock).await;
        let a = kb.create_personal("alice", "A", None).await.unwrap();
        let b = kb.create_personal("alice", "B", None).await.unwrap();
        let file_id = kb
            .add_file("alice", &a, "x.txt", "assistants", b"data")
            .await
            .unwrap();

        // A file id is only valid against its own parent store.
        let err = kb.remove_file("alice", &b, &file_id).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        kb.remove_file("alice", &a, &file_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_owned_populates_counts() {
        let mock = MockSearchProvider::new();
        let kb = kb(&mock).await;
        let id = kb.create_personal("alice", "Docs", None).await.unwrap();
        kb.add_file("alice", &id, "a.txt", "assistants", b"1")
            .await
            .unwrap();
        kb.add_file("alice", &id, "b.txt", "assistants", b"2")
            .await
            .unwrap();

        let listed = kb.list_owned("alice", None).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].file_counts.total, 2);
        assert_eq!(listed[0].status, StoreStatus::Completed);
    }
}
