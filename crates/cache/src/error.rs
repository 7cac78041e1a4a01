//! Error conditions callers of the cache need to tell apart
//!
//! Operations return `anyhow::Result`; these values travel inside the
//! `anyhow::Error` and can be recovered with `downcast_ref::<CacheError>()`.
//! Storage engine failures are passed through as `rusqlite::Error`.

use crate::models::Event;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Only `Event::Message` values can be written to the cache
    #[error("unexpected message type: {0}")]
    UnexpectedMessageType(Event),

    #[error("message not found: {topic}/{id}")]
    NotFound { topic: String, id: String },

    /// The messages table exists but the schema version row does not
    #[error("cannot determine schema version: cache file may be corrupt")]
    CorruptSchema,

    #[error("unexpected schema version {found}, this build supports up to {current}")]
    FutureSchema { found: u32, current: u32 },

    #[error("no migration registered from schema version {0}")]
    MissingMigration(u32),
}

impl CacheError {
    /// Check whether an error returned by the cache is a not-found condition
    pub fn is_not_found(err: &anyhow::Error) -> bool {
        matches!(err.downcast_ref::<CacheError>(), Some(CacheError::NotFound { .. }))
    }
}
