//! Contracts consumed from the conversation-persistence collaborator.
//!
//! The knowledge base never owns threads; it only reacts to them. The
//! collaborator tells us when threads die (via [`ThreadEvent`] on a
//! broadcast channel) and, optionally, lets us verify and register
//! bindings through [`ConversationStore`].

use async_trait::async_trait;

/// Events published by the conversation store.
#[derive(Debug, Clone)]
pub enum ThreadEvent {
    /// A conversation thread was deleted.
    Deleted {
        /// Id of the deleted thread.
        thread_id: String,
    },
}

/// Abstract contract of the conversation-persistence collaborator.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Whether the thread currently exists.
    async fn thread_exists(&self, thread_id: &str) -> bool;

    /// Record that `record_id` is the knowledge store bound to `thread_id`.
    async fn bind_record(&self, thread_id: &str, record_id: &str);
}
