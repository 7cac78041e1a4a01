//! Storage traits and implementations
//!
//! This module defines the cache abstraction and its three modes. The
//! trait-based design lets the rest of the service stay unaware of whether
//! messages go to a file, a shared in-memory database, or nowhere.

mod migrate;
mod nop;
mod query;
mod sqlite;
mod traits;

use std::sync::Arc;

use anyhow::Result;
use log::info;

pub use migrate::CURRENT_SCHEMA_VERSION;
pub use nop::NopCache;
pub use sqlite::SqliteCache;
pub use traits::MessageCache;

use crate::config::{CacheConfig, CacheMode};
use crate::error::CacheError;
use crate::models::{Event, Message};

/// Open the cache selected by the configuration
pub fn open_cache(config: &CacheConfig) -> Result<Arc<dyn MessageCache>> {
    let cache: Arc<dyn MessageCache> = match &config.mode {
        CacheMode::File { path } => {
            info!("Using message cache file {}", path.display());
            Arc::new(SqliteCache::open(path)?)
        }
        CacheMode::Memory => {
            info!("Using in-memory message cache");
            Arc::new(SqliteCache::open_in_memory()?)
        }
        CacheMode::Nop => {
            info!("Message cache disabled");
            Arc::new(NopCache)
        }
    };
    Ok(cache)
}

/// Reject anything that is not a deliverable message
pub(crate) fn ensure_storable(message: &Message) -> Result<()> {
    if message.event != Event::Message {
        return Err(CacheError::UnexpectedMessageType(message.event).into());
    }
    Ok(())
}
