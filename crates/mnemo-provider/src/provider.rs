//! Search provider trait definition.
//!
//! This is the seam between the knowledge base and whatever external
//! system actually performs semantic search. The knowledge base only
//! manages existence and metadata of remote stores; it never reads
//! embeddings back.

use crate::error::Result;

/// A store that exists on the remote provider.
#[derive(Debug, Clone)]
pub struct RemoteStore {
    /// Provider-assigned store identifier.
    pub id: String,
    /// Display name as accepted by the provider.
    pub name: String,
}

/// A file attached to a remote store.
#[derive(Debug, Clone)]
pub struct RemoteFile {
    /// Provider-assigned file identifier.
    pub id: String,
    /// Original filename.
    pub filename: String,
    /// File size in bytes as reported by the provider.
    pub size_bytes: u64,
}

/// Trait for external semantic-search providers.
///
/// Implementations must be safe to share across tasks. All methods are
/// single attempts: retry policy and timeouts belong to the caller.
#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    /// Provider name for logging (e.g. "http", "mock").
    fn name(&self) -> &str;

    /// Create a remote store and return its provider-assigned identity.
    async fn create_store(&self, name: &str) -> Result<RemoteStore>;

    /// Rename an existing remote store.
    async fn update_store(&self, remote_id: &str, name: &str) -> Result<()>;

    /// Delete a remote store and everything attached to it.
    async fn delete_store(&self, remote_id: &str) -> Result<()>;

    /// Upload file content and attach it to a remote store.
    async fn add_file(&self, remote_id: &str, filename: &str, bytes: &[u8]) -> Result<RemoteFile>;

    /// Detach and delete a file from a remote store.
    async fn remove_file(&self, remote_id: &str, remote_file_id: &str) -> Result<()>;

    /// List files currently attached to a remote store.
    async fn list_files(&self, remote_id: &str) -> Result<Vec<RemoteFile>>;
}
