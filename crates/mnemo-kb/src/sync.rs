//! SyncEngine — synchronization state machine against the external provider.
//!
//! Per-record states: unsynced → provisioning → synced / local_only, with
//! stale and deprovisioning → gone on the way out. Provisioning,
//! deprovisioning and gone are transient and exist only inside these
//! methods; the four storable states live in [`SyncState`].
//!
//! The asymmetry is deliberate: local deletion never fails because the
//! remote side failed, but local create/update failures always surface.
//! Local state is authoritative and must never drift into "record exists
//! locally but the caller was told it doesn't".

use crate::retry::{retry_with_backoff, RetryConfig};
use crate::types::{FileRecord, SyncState, VectorStoreRecord};
use mnemo_provider::{ProviderError, SearchProvider};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default deadline for any single remote call.
const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(30);

/// Drives remote provisioning and records sync outcomes on records.
pub struct SyncEngine {
    provider: Option<Arc<dyn SearchProvider>>,
    /// Set once, process-wide, when the provider reveals it has no
    /// semantic-store capability; all later creates skip the remote
    /// attempt entirely instead of failing the same way repeatedly.
    capability_absent: AtomicBool,
    retry: RetryConfig,
    remote_timeout: Duration,
}

impl SyncEngine {
    /// Engine backed by a provider.
    pub fn new(provider: Arc<dyn SearchProvider>, retry: RetryConfig) -> Self {
        Self {
            provider: Some(provider),
            capability_absent: AtomicBool::new(false),
            retry,
            remote_timeout: DEFAULT_REMOTE_TIMEOUT,
        }
    }

    /// Engine with no provider at all: everything is local-only.
    pub fn local_only() -> Self {
        Self {
            provider: None,
            capability_absent: AtomicBool::new(false),
            retry: RetryConfig::none(),
            remote_timeout: DEFAULT_REMOTE_TIMEOUT,
        }
    }

    /// Override the per-call remote deadline.
    #[must_use]
    pub fn with_remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = timeout;
        self
    }

    /// Whether the provider has been found to lack the capability.
    pub fn capability_absent(&self) -> bool {
        self.capability_absent.load(Ordering::SeqCst)
    }

    /// The provider, unless absent or known-incapable.
    fn remote(&self) -> Option<&Arc<dyn SearchProvider>> {
        if self.capability_absent() {
            return None;
        }
        self.provider.as_ref()
    }

    fn mark_capability_absent(&self) {
        if !self.capability_absent.swap(true, Ordering::SeqCst) {
            info!("provider lacks the semantic-store capability; switching to local-only mode");
        }
    }

    /// Bound a remote call by the engine deadline. A timeout maps to a
    /// transient error so the record always lands in a defined state.
    async fn deadline<T, F>(&self, call: F) -> Result<T, ProviderError>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        match tokio::time::timeout(self.remote_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(
                self.remote_timeout.as_millis() as u64
            )),
        }
    }

    // ── Create ──────────────────────────────────────────────────

    /// Provision a remote counterpart for a new record.
    ///
    /// Never fails: every outcome is a sync-state transition. Transient
    /// errors are retried with backoff; exhaustion degrades this record
    /// (and only this record) to local-only.
    pub async fn provision(&self, record: &mut VectorStoreRecord) {
        let Some(provider) = self.remote() else {
            record.sync_state = SyncState::LocalOnly;
            debug!(id = %record.id, "no remote provider; record is local-only");
            return;
        };

        let result = retry_with_backoff(&self.retry, || {
            let provider = Arc::clone(provider);
            let name = record.name.clone();
            self.deadline(async move { provider.create_store(&name).await })
        })
        .await;

        match result {
            Ok(remote) => {
                debug!(id = %record.id, remote_id = %remote.id, "record provisioned remotely");
                record.remote_id = Some(remote.id);
                record.sync_state = SyncState::Synced;
            }
            Err(ProviderError::CapabilityAbsent) => {
                self.mark_capability_absent();
                record.sync_state = SyncState::LocalOnly;
            }
            Err(e) => {
                warn!(id = %record.id, error = %e, "remote provisioning failed; keeping record local-only");
                record.sync_state = SyncState::LocalOnly;
            }
        }
    }

    // ── Update ──────────────────────────────────────────────────

    /// Propagate the record's current metadata (name) to the remote side.
    ///
    /// Local-first: the caller's mutation already happened and is never
    /// rolled back here. A transient remote failure marks the record
    /// stale; the remote copy is considered possibly out of date.
    pub async fn push_update(&self, record: &mut VectorStoreRecord) {
        let Some((provider, remote_id)) = self.remote_counterpart(record) else {
            return;
        };

        let result = self
            .deadline(provider.update_store(&remote_id, &record.name))
            .await;
        match result {
            Ok(()) => record.sync_state = SyncState::Synced,
            Err(ProviderError::CapabilityAbsent) => {
                self.mark_capability_absent();
                record.sync_state = SyncState::LocalOnly;
                record.remote_id = None;
            }
            Err(e) => {
                warn!(id = %record.id, error = %e, "remote update failed; marking record stale");
                record.sync_state = SyncState::Stale;
            }
        }
    }

    /// Upload and attach a file to the record's remote counterpart.
    pub async fn push_file(
        &self,
        record: &mut VectorStoreRecord,
        file: &mut FileRecord,
        bytes: &[u8],
    ) {
        let Some((provider, remote_id)) = self.remote_counterpart(record) else {
            return;
        };

        let result = self
            .deadline(provider.add_file(&remote_id, &file.filename, bytes))
            .await;
        match result {
            Ok(remote_file) => {
                debug!(id = %record.id, remote_file_id = %remote_file.id, "file attached remotely");
                file.remote_file_id = Some(remote_file.id);
                record.sync_state = SyncState::Synced;
            }
            Err(ProviderError::CapabilityAbsent) => {
                self.mark_capability_absent();
                record.sync_state = SyncState::LocalOnly;
                record.remote_id = None;
            }
            Err(e) => {
                warn!(id = %record.id, error = %e, "remote file attach failed; marking record stale");
                record.sync_state = SyncState::Stale;
            }
        }
    }

    /// Detach a file from the record's remote counterpart.
    pub async fn remove_file(&self, record: &mut VectorStoreRecord, file: &FileRecord) {
        let Some((provider, remote_id)) = self.remote_counterpart(record) else {
            return;
        };
        let Some(remote_file_id) = file.remote_file_id.clone() else {
            return;
        };

        let result = self
            .deadline(provider.remove_file(&remote_id, &remote_file_id))
            .await;
        match result {
            Ok(()) => {}
            Err(ProviderError::CapabilityAbsent) => {
                self.mark_capability_absent();
                record.sync_state = SyncState::LocalOnly;
                record.remote_id = None;
            }
            Err(e) => {
                warn!(id = %record.id, error = %e, "remote file detach failed; marking record stale");
                record.sync_state = SyncState::Stale;
            }
        }
    }

    // ── Delete ──────────────────────────────────────────────────

    /// Remove the record's remote counterpart, if one exists.
    ///
    /// The user's intent (remove the record from their workspace) is
    /// already satisfied locally, so a remote failure here is logged and
    /// absorbed, never propagated.
    pub async fn deprovision(&self, record: &VectorStoreRecord) {
        let Some((provider, remote_id)) = self.remote_counterpart(record) else {
            return;
        };

        match self.deadline(provider.delete_store(&remote_id)).await {
            Ok(()) => debug!(id = %record.id, remote_id = %remote_id, "remote store deleted"),
            Err(ProviderError::CapabilityAbsent) => self.mark_capability_absent(),
            Err(e) => {
                warn!(id = %record.id, error = %e, "remote deprovision failed; local deletion proceeds");
            }
        }
    }

    /// Provider handle and remote id, but only for records whose sync
    /// state permits remote contact. `LocalOnly` never reaches out.
    fn remote_counterpart(
        &self,
        record: &VectorStoreRecord,
    ) -> Option<(Arc<dyn SearchProvider>, String)> {
        if !matches!(record.sync_state, SyncState::Synced | SyncState::Stale) {
            return None;
        }
        let provider = self.remote()?;
        let remote_id = record.remote_id.clone()?;
        Some((Arc::clone(provider), remote_id))
    }
}
