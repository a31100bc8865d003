//! TierManager — tier-specific creation policy.
//!
//! Company records exist only through the administrative seeding path at
//! process start. Personal records come from explicit owner commands.
//! Session records appear implicitly on first upload within a thread, and
//! their creation is single-flighted per thread key so concurrent uploads
//! can never produce two records for one thread.

use crate::config::CompanySeed;
use crate::conversation::ConversationStore;
use crate::error::{Error, Result};
use crate::locks::KeyLocks;
use crate::store::MetadataStore;
use crate::sync::SyncEngine;
use crate::types::{Category, Tier, VectorStoreRecord, SYSTEM_OWNER_ID};
use std::sync::Arc;
use tracing::{debug, info};

/// Creation policy per tier.
pub struct TierManager {
    store: MetadataStore,
    sync: Arc<SyncEngine>,
    conversations: Option<Arc<dyn ConversationStore>>,
    thread_locks: KeyLocks,
}

impl TierManager {
    /// New manager over the given store and sync engine.
    pub fn new(
        store: MetadataStore,
        sync: Arc<SyncEngine>,
        conversations: Option<Arc<dyn ConversationStore>>,
    ) -> Self {
        Self {
            store,
            sync,
            conversations,
            thread_locks: KeyLocks::new(),
        }
    }

    /// Guard for user-facing creation requests: only the personal tier may
    /// be created by command. Company records are seed-only and session
    /// records appear implicitly on upload.
    pub fn check_user_creatable(tier: Tier) -> Result<()> {
        match tier {
            Tier::Personal => Ok(()),
            Tier::Company => Err(Error::PermissionDenied),
            Tier::Session => Err(Error::InvalidArgument(
                "session stores are created implicitly on upload".to_string(),
            )),
        }
    }

    /// Create a personal record for a human owner.
    pub async fn create_personal(
        &self,
        owner_id: &str,
        name: &str,
        category: Option<Category>,
    ) -> Result<VectorStoreRecord> {
        if owner_id.is_empty() {
            return Err(Error::InvalidArgument("owner_id must not be empty".into()));
        }
        if owner_id == SYSTEM_OWNER_ID {
            // The reserved identity owns company records only.
            return Err(Error::PermissionDenied);
        }
        if name.is_empty() {
            return Err(Error::InvalidArgument("name must not be empty".into()));
        }

        let mut record = VectorStoreRecord::new_personal(owner_id, name, category);
        self.sync.provision(&mut record).await;
        self.store.put(&record).await?;
        info!(id = %record.id, owner_id, "personal store created");
        Ok(record)
    }

    /// Get the session record bound to `thread_id`, creating it if absent.
    ///
    /// Idempotent and single-flight: N concurrent calls for one thread
    /// yield exactly one record and N identical ids.
    pub async fn get_or_create_for_thread(
        &self,
        thread_id: &str,
        owner_id: &str,
    ) -> Result<VectorStoreRecord> {
        if thread_id.is_empty() {
            return Err(Error::InvalidArgument("thread_id must not be empty".into()));
        }

        let _guard = self.thread_locks.acquire(thread_id).await;

        if let Some(existing) = self.store.get_by_thread(thread_id).await? {
            debug!(id = %existing.id, thread_id, "reusing bound session store");
            return Ok(existing);
        }

        if let Some(conversations) = &self.conversations {
            if !conversations.thread_exists(thread_id).await {
                return Err(Error::NotFound(format!("thread {thread_id}")));
            }
        }

        let mut record = VectorStoreRecord::new_session(owner_id, thread_id);
        self.sync.provision(&mut record).await;
        self.store.put(&record).await?;

        if let Some(conversations) = &self.conversations {
            conversations.bind_record(thread_id, &record.id).await;
        }

        info!(id = %record.id, thread_id, owner_id, "session store created and bound");
        Ok(record)
    }

    /// Seed company records from configuration. Administrative path, run
    /// once at process start; existing seed ids are left untouched.
    /// Returns the number of records newly seeded.
    pub async fn seed_company(&self, seeds: &[CompanySeed]) -> Result<usize> {
        let mut seeded = 0;
        for seed in seeds {
            if self.store.get(&seed.id).await?.is_some() {
                debug!(id = %seed.id, "company seed already present");
                continue;
            }
            let mut record = VectorStoreRecord::new_company(&seed.id, &seed.name, seed.category);
            self.sync.provision(&mut record).await;
            self.store.put(&record).await?;
            seeded += 1;
        }
        info!(seeded, total = seeds.len(), "company tier seeded");
        Ok(seeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryConfig;
    use crate::types::SyncState;
    use mnemo_provider::MockSearchProvider;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn sync_with(mock: &MockSearchProvider) -> Arc<SyncEngine> {
        Arc::new(SyncEngine::new(
            Arc::new(mock.clone()),
            RetryConfig::none(),
        ))
    }

    async fn manager(mock: &MockSearchProvider) -> TierManager {
        let store = MetadataStore::in_memory().await.unwrap();
        TierManager::new(store, sync_with(mock), None)
    }

    #[tokio::test]
    async fn test_create_personal() {
        let mock = MockSearchProvider::new();
        let tiers = manager(&mock).await;

        let rec = tiers
            .create_personal("alice", "Notes", Some(Category::Knowledge))
            .await
            .unwrap();
        assert_eq!(rec.tier, Tier::Personal);
        assert_eq!(rec.sync_state, SyncState::Synced);
        assert!(tiers.store.get(&rec.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_personal_rejects_reserved_identity() {
        let mock = MockSearchProvider::new();
        let tiers = manager(&mock).await;
        let err = tiers
            .create_personal(SYSTEM_OWNER_ID, "Notes", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PermissionDenied));
    }

    #[tokio::test]
    async fn test_company_tier_not_user_creatable() {
        assert!(matches!(
            TierManager::check_user_creatable(Tier::Company),
            Err(Error::PermissionDenied)
        ));
        assert!(matches!(
            TierManager::check_user_creatable(Tier::Session),
            Err(Error::InvalidArgument(_))
        ));
        assert!(TierManager::check_user_creatable(Tier::Personal).is_ok());
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let mock = MockSearchProvider::new();
        let tiers = manager(&mock).await;

        let first = tiers.get_or_create_for_thread("t1", "alice").await.unwrap();
        let second = tiers.get_or_create_for_thread("t1", "alice").await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(tiers.store.record_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_session_creation_single_flight() {
        let mock = MockSearchProvider::new();
        let tiers = Arc::new(manager(&mock).await);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let tiers = tiers.clone();
            handles.push(tokio::spawn(async move {
                tiers
                    .get_or_create_for_thread("t1", "alice")
                    .await
                    .unwrap()
                    .id
            }));
        }
        let mut ids = Vec::new();
        for h in handles {
            ids.push(h.await.unwrap());
        }
        ids.dedup();
        assert_eq!(ids.len(), 1, "all callers must observe the same record");
        assert_eq!(tiers.store.record_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_seed_company_idempotent() {
        let mock = MockSearchProvider::new();
        let tiers = manager(&mock).await;
        let seeds = vec![
            CompanySeed {
                id: "vs_handbook".into(),
                name: "Handbook".into(),
                category: None,
            },
            CompanySeed {
                id: "vs_runbooks".into(),
                name: "Runbooks".into(),
                category: Some(Category::Knowledge),
            },
        ];

        assert_eq!(tiers.seed_company(&seeds).await.unwrap(), 2);
        assert_eq!(tiers.seed_company(&seeds).await.unwrap(), 0);

        let rec = tiers.store.get("vs_handbook").await.unwrap().unwrap();
        assert_eq!(rec.tier, Tier::Company);
        assert_eq!(rec.owner_id, SYSTEM_OWNER_ID);
    }

    struct FakeConversations {
        threads: Vec<String>,
        bindings: Mutex<HashMap<String, String>>,
    }

    #[async_trait::async_trait]
    impl ConversationStore for FakeConversations {
        async fn thread_exists(&self, thread_id: &str) -> bool {
            self.threads.iter().any(|t| t == thread_id)
        }
        async fn bind_record(&self, thread_id: &str, record_id: &str) {
            self.bindings
                .lock()
                .unwrap()
                .insert(thread_id.to_string(), record_id.to_string());
        }
    }

    #[tokio::test]
    async fn test_session_creation_notifies_conversation_store() {
        let mock = MockSearchProvider::new();
        let store = MetadataStore::in_memory().await.unwrap();
        let conversations = Arc::new(FakeConversations {
            threads: vec!["t1".to_string()],
            bindings: Mutex::new(HashMap::new()),
        });
        let tiers = TierManager::new(store, sync_with(&mock), Some(conversations.clone()));

        let rec = tiers.get_or_create_for_thread("t1", "alice").await.unwrap();
        assert_eq!(
            conversations.bindings.lock().unwrap().get("t1"),
            Some(&rec.id)
        );

        // Unknown threads are rejected before any record is created.
        let err = tiers
            .get_or_create_for_thread("t9", "alice")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
