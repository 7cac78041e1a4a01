//! Storage trait definitions

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::models::{Message, SinceMarker, Topic};

/// Trait for message cache operations
///
/// Implemented by every cache mode (file, in-memory, no-op) so the ingest
/// path, the scheduled-message publisher and the attachment reaper can use
/// whichever one is configured.
pub trait MessageCache: Send + Sync {
    /// Store a message
    ///
    /// Messages whose time lies in the future are stored as scheduled.
    /// Fails with `CacheError::UnexpectedMessageType` for control events.
    fn add_message(&self, message: &Message) -> Result<()>;

    /// Rewrite the mutable fields of the message matching (topic, id)
    ///
    /// Updating a message that does not exist is not an error.
    fn update_message(&self, message: &Message) -> Result<()>;

    /// List messages for a topic, ordered by time then insertion order
    fn messages(
        &self,
        topic: &str,
        since: &SinceMarker,
        include_scheduled: bool,
    ) -> Result<Vec<Message>>;

    /// Get a single message by topic and ID, published or not
    ///
    /// Fails with `CacheError::NotFound` if there is no such message.
    fn message(&self, topic: &str, id: &str) -> Result<Message>;

    /// List scheduled messages whose time has come, ordered like `messages`
    fn messages_due(&self) -> Result<Vec<Message>>;

    /// Mark every message with this message's ID as published
    fn mark_published(&self, message: &Message) -> Result<()>;

    /// Count messages in a topic, published or not
    fn message_count(&self, topic: &str) -> Result<usize>;

    /// List every topic that has at least one message
    fn topics(&self) -> Result<Vec<Topic>>;

    /// Delete published messages older than the cutoff
    fn prune(&self, older_than: DateTime<Utc>) -> Result<()>;

    /// Total size in bytes of the owner's unexpired attachments
    fn attachments_size(&self, owner: &str) -> Result<i64>;

    /// IDs of messages whose attachment has expired
    fn attachments_expired(&self) -> Result<Vec<String>>;
}
