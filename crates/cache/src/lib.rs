//! Cache crate - Durable message store for the beacon pub/sub service
//!
//! This crate provides the persistence layer behind topic delivery:
//! - Domain models (Message, Attachment, Topic, SinceMarker)
//! - A versioned schema migrator for the SQLite cache file
//! - Replay queries driven by time- or position-based cursors
//! - Scheduled message tracking (scheduled -> published)
//! - Attachment quota accounting and retention pruning
//!
//! Three cache modes (file, shared in-memory, no-op) implement the same
//! [`MessageCache`] trait so callers never need to know which is in use.

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod storage;

pub use crate::config::{CacheConfig, CacheMode};
pub use crate::error::CacheError;
pub use crate::models::{Attachment, Event, Message, MessageBuilder, SinceMarker, Topic};
pub use crate::storage::{CURRENT_SCHEMA_VERSION, MessageCache, NopCache, SqliteCache, open_cache};
