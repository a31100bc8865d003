//! Scripted mock provider for tests.
//!
//! Outcomes are queued ahead of time; each provider call consumes one.
//! An empty queue means success, so happy-path tests need no scripting.

use crate::error::{ProviderError, Result};
use crate::provider::{RemoteFile, RemoteStore, SearchProvider};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Scripted outcome for a single mock call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockOutcome {
    /// The call succeeds.
    Ok,
    /// The call fails with [`ProviderError::CapabilityAbsent`].
    CapabilityAbsent,
    /// The call fails with [`ProviderError::Transient`].
    Transient,
    /// The call fails with [`ProviderError::Timeout`].
    Timeout,
}

#[derive(Default)]
struct Inner {
    script: VecDeque<MockOutcome>,
    stores: HashMap<String, Vec<RemoteFile>>,
    deleted_stores: Vec<String>,
    calls: u32,
    next_id: u32,
}

/// A [`SearchProvider`] with scripted failures and inspectable state.
#[derive(Clone, Default)]
pub struct MockSearchProvider {
    inner: Arc<Mutex<Inner>>,
}

impl MockSearchProvider {
    /// Mock that succeeds on every call.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock whose first calls consume the given outcomes in order.
    #[must_use]
    pub fn scripted(outcomes: impl IntoIterator<Item = MockOutcome>) -> Self {
        let mock = Self::new();
        for outcome in outcomes {
            mock.push_outcome(outcome);
        }
        mock
    }

    /// Queue one more outcome.
    pub fn push_outcome(&self, outcome: MockOutcome) {
        self.lock().script.push_back(outcome);
    }

    /// Total number of provider calls made.
    pub fn calls(&self) -> u32 {
        self.lock().calls
    }

    /// Whether a remote store with this id currently exists.
    pub fn has_store(&self, remote_id: &str) -> bool {
        self.lock().stores.contains_key(remote_id)
    }

    /// Ids of stores that were deleted, in deletion order.
    pub fn deleted_store_ids(&self) -> Vec<String> {
        self.lock().deleted_stores.clone()
    }

    /// Number of files attached to a remote store (0 if unknown).
    pub fn file_count(&self, remote_id: &str) -> usize {
        self.lock().stores.get(remote_id).map_or(0, Vec::len)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Consume the next scripted outcome (default Ok) and count the call.
    fn take_outcome(&self) -> Result<()> {
        let mut inner = self.lock();
        inner.calls += 1;
        match inner.script.pop_front().unwrap_or(MockOutcome::Ok) {
            MockOutcome::Ok => Ok(()),
            MockOutcome::CapabilityAbsent => Err(ProviderError::CapabilityAbsent),
            MockOutcome::Transient => Err(ProviderError::Transient("scripted failure".into())),
            MockOutcome::Timeout => Err(ProviderError::Timeout(1)),
        }
    }
}

#[async_trait::async_trait]
impl SearchProvider for MockSearchProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn create_store(&self, name: &str) -> Result<RemoteStore> {
        self.take_outcome()?;
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = format!("remote-vs-{}", inner.next_id);
        inner.stores.insert(id.clone(), Vec::new());
        Ok(RemoteStore {
            id,
            name: name.to_string(),
        })
    }

    async fn update_store(&self, remote_id: &str, _name: &str) -> Result<()> {
        self.take_outcome()?;
        if !self.lock().stores.contains_key(remote_id) {
            return Err(ProviderError::Transient(format!(
                "unknown store {remote_id}"
            )));
        }
        Ok(())
    }

    async fn delete_store(&self, remote_id: &str) -> Result<()> {
        self.take_outcome()?;
        let mut inner = self.lock();
        inner.stores.remove(remote_id);
        inner.deleted_stores.push(remote_id.to_string());
        Ok(())
    }

    async fn add_file(&self, remote_id: &str, filename: &str, bytes: &[u8]) -> Result<RemoteFile> {
        self.take_outcome()?;
        let mut inner = self.lock();
        inner.next_id += 1;
        let file = RemoteFile {
            id: format!("remote-file-{}", inner.next_id),
            filename: filename.to_string(),
            size_bytes: bytes.len() as u64,
        };
        inner
            .stores
            .get_mut(remote_id)
            .ok_or_else(|| ProviderError::Transient(format!("unknown store {remote_id}")))?
            .push(file.clone());
        Ok(file)
    }

    async fn remove_file(&self, remote_id: &str, remote_file_id: &str) -> Result<()> {
        self.take_outcome()?;
        if let Some(files) = self.lock().stores.get_mut(remote_id) {
            files.retain(|f| f.id != remote_file_id);
        }
        Ok(())
    }

    async fn list_files(&self, remote_id: &str) -> Result<Vec<RemoteFile>> {
        self.take_outcome()?;
        Ok(self
            .lock()
            .stores
            .get(remote_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_outcome_is_ok() {
        let mock = MockSearchProvider::new();
        let store = mock.create_store("notes").await.unwrap();
        assert!(mock.has_store(&store.id));
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_scripted_failures_consumed_in_order() {
        let mock =
            MockSearchProvider::scripted([MockOutcome::Transient, MockOutcome::CapabilityAbsent]);

        let err = mock.create_store("a").await.unwrap_err();
        assert!(err.is_transient());

        let err = mock.create_store("b").await.unwrap_err();
        assert!(matches!(err, ProviderError::CapabilityAbsent));

        // Script exhausted: back to success.
        mock.create_store("c").await.unwrap();
        assert_eq!(mock.calls(), 3);
    }

    #[tokio::test]
    async fn test_file_lifecycle() {
        let mock = MockSearchProvider::new();
        let store = mock.create_store("docs").await.unwrap();

        let file = mock.add_file(&store.id, "a.txt", b"hello").await.unwrap();
        assert_eq!(file.size_bytes, 5);
        assert_eq!(mock.file_count(&store.id), 1);

        let listed = mock.list_files(&store.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].filename, "a.txt");

        mock.remove_file(&store.id, &file.id).await.unwrap();
        assert_eq!(mock.file_count(&store.id), 0);
    }

    #[tokio::test]
    async fn test_delete_tracks_deleted_ids() {
        let mock = MockSearchProvider::new();
        let store = mock.create_store("tmp").await.unwrap();
        mock.delete_store(&store.id).await.unwrap();
        assert!(!mock.has_store(&store.id));
        assert_eq!(mock.deleted_store_ids(), vec![store.id]);
    }
}
