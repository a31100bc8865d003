//! LifecycleCoordinator — cascading deletion of session records.
//!
//! Thread deletion is both necessary and sufficient to delete the bound
//! session record, locally and remotely. This is the only path permitted
//! to delete a session-tier record; the facade rejects direct deletes.
//!
//! Acts as the reserved system identity and goes through the ownership
//! guard like everyone else.

use crate::conversation::ThreadEvent;
use crate::error::{Error, Result};
use crate::guard;
use crate::locks::KeyLocks;
use crate::store::MetadataStore;
use crate::sync::SyncEngine;
use crate::types::{Tier, SYSTEM_OWNER_ID};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Subscribes to thread deletions and cascades them to session records.
pub struct LifecycleCoordinator {
    store: MetadataStore,
    sync: Arc<SyncEngine>,
    record_locks: Arc<KeyLocks>,
}

impl LifecycleCoordinator {
    /// New coordinator sharing the facade's per-record locks.
    pub fn new(store: MetadataStore, sync: Arc<SyncEngine>, record_locks: Arc<KeyLocks>) -> Self {
        Self {
            store,
            sync,
            record_locks,
        }
    }

    /// Cascade a thread deletion to its bound session record.
    ///
    /// Idempotent: repeated notifications for an already-deleted thread
    /// are no-ops, not errors.
    pub async fn on_thread_deleted(&self, thread_id: &str) -> Result<()> {
        let Some(record) = self.store.get_by_thread(thread_id).await? else {
            debug!(thread_id, "no session store bound to deleted thread");
            return Ok(());
        };

        let _guard = self.record_locks.acquire(&record.id).await;

        // Re-check under the lock: a concurrent notification may have won.
        let Some(record) = self.store.get_by_thread(thread_id).await? else {
            return Ok(());
        };

        if record.tier != Tier::Session {
            // Thread bindings only ever point at session records; anything
            // else is a data bug we refuse to cascade into.
            warn!(id = %record.id, thread_id, tier = %record.tier, "thread bound to non-session store; skipping cascade");
            return Ok(());
        }

        let caps = guard::capabilities(&record, SYSTEM_OWNER_ID);
        if !caps.delete {
            return Err(Error::PermissionDenied);
        }

        self.sync.deprovision(&record).await;
        self.store.delete(&record.id).await?;
        info!(id = %record.id, thread_id, "session store deleted with its thread");
        Ok(())
    }

    /// Consume thread events until the channel closes. Errors are logged,
    /// never fatal to the loop.
    pub async fn run(self: Arc<Self>, mut events: broadcast::Receiver<ThreadEvent>) {
        loop {
            match events.recv().await {
                Ok(ThreadEvent::Deleted { thread_id }) => {
                    if let Err(e) = self.on_thread_deleted(&thread_id).await {
                        warn!(thread_id, error = %e, "thread-deletion cascade failed");
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "thread event receiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        debug!("thread event channel closed; lifecycle loop exiting");
    }
}
