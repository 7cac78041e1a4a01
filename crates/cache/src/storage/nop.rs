//! Cache mode that discards everything
//!
//! Used when caching is disabled. It holds no state, so any number of
//! callers can share it.

use anyhow::Result;
use chrono::{DateTime, Utc};

use super::ensure_storable;
use super::traits::MessageCache;
use crate::error::CacheError;
use crate::models::{Message, SinceMarker, Topic};

#[derive(Debug, Clone, Copy, Default)]
pub struct NopCache;

impl MessageCache for NopCache {
    fn add_message(&self, message: &Message) -> Result<()> {
        ensure_storable(message)
    }

    fn update_message(&self, message: &Message) -> Result<()> {
        ensure_storable(message)
    }

    fn messages(
        &self,
        _topic: &str,
        _since: &SinceMarker,
        _include_scheduled: bool,
    ) -> Result<Vec<Message>> {
        Ok(Vec::new())
    }

    fn message(&self, topic: &str, id: &str) -> Result<Message> {
        Err(CacheError::NotFound {
            topic: topic.to_string(),
            id: id.to_string(),
        }
        .into())
    }

    fn messages_due(&self) -> Result<Vec<Message>> {
        Ok(Vec::new())
    }

    fn mark_published(&self, _message: &Message) -> Result<()> {
        Ok(())
    }

    fn message_count(&self, _topic: &str) -> Result<usize> {
        Ok(0)
    }

    fn topics(&self) -> Result<Vec<Topic>> {
        Ok(Vec::new())
    }

    fn prune(&self, _older_than: DateTime<Utc>) -> Result<()> {
        Ok(())
    }

    fn attachments_size(&self, _owner: &str) -> Result<i64> {
        Ok(0)
    }

    fn attachments_expired(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Event;

    #[test]
    fn test_writes_are_discarded() {
        let cache = NopCache;
        let message = Message::builder("t").id("m1").message("hi").build();

        cache.add_message(&message).unwrap();
        cache.update_message(&message).unwrap();

        assert!(cache.messages("t", &SinceMarker::AllMessages, true).unwrap().is_empty());
        assert!(CacheError::is_not_found(&cache.message("t", "m1").unwrap_err()));
        assert_eq!(cache.message_count("t").unwrap(), 0);
        assert!(cache.topics().unwrap().is_empty());
    }

    #[test]
    fn test_control_events_still_rejected() {
        let cache = NopCache;
        let open = Message::new_event(Event::Open, "t");
        assert!(cache.add_message(&open).is_err());
    }
}
