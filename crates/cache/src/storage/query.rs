//! Resolution of replay cursors into concrete row-range queries

use anyhow::Result;

use crate::models::SinceMarker;

/// Store-assigned insertion sequence number of a row
///
/// Used only for ordering and ID-based pagination; never handed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct RowPosition(pub i64);

/// Concrete query a [`SinceMarker`] resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SinceQuery {
    /// Nothing to return, storage is not touched
    Empty,
    /// Rows with `time >= since`
    SinceTime { since: i64, include_scheduled: bool },
    /// Rows inserted after the given position
    ///
    /// With `include_scheduled`, unpublished rows are returned regardless of
    /// position since no subscriber has seen them yet.
    SinceRow {
        position: RowPosition,
        include_scheduled: bool,
    },
}

impl SinceQuery {
    /// Resolve a marker for one topic
    ///
    /// `lookup` maps a message ID to its row position in the topic. An ID
    /// that cannot be found (stale or never existed) replays the full
    /// history instead of failing.
    pub(crate) fn resolve<F>(since: &SinceMarker, include_scheduled: bool, lookup: F) -> Result<Self>
    where
        F: FnOnce(&str) -> Result<Option<RowPosition>>,
    {
        let query = match since {
            SinceMarker::None => SinceQuery::Empty,
            SinceMarker::AllMessages => SinceQuery::SinceTime {
                since: 0,
                include_scheduled,
            },
            SinceMarker::Time(t) => SinceQuery::SinceTime {
                since: t.timestamp(),
                include_scheduled,
            },
            SinceMarker::Id(id) => match lookup(id)? {
                Some(position) => SinceQuery::SinceRow {
                    position,
                    include_scheduled,
                },
                None => SinceQuery::SinceTime {
                    since: 0,
                    include_scheduled,
                },
            },
        };
        Ok(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn no_lookup(_: &str) -> Result<Option<RowPosition>> {
        panic!("lookup must not be called");
    }

    #[test]
    fn test_none_is_empty() {
        let q = SinceQuery::resolve(&SinceMarker::None, true, no_lookup).unwrap();
        assert_eq!(q, SinceQuery::Empty);
    }

    #[test]
    fn test_all_messages_is_time_zero() {
        let q = SinceQuery::resolve(&SinceMarker::AllMessages, false, no_lookup).unwrap();
        assert_eq!(
            q,
            SinceQuery::SinceTime {
                since: 0,
                include_scheduled: false
            }
        );
    }

    #[test]
    fn test_time_marker() {
        let t = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let q = SinceQuery::resolve(&SinceMarker::Time(t), true, no_lookup).unwrap();
        assert_eq!(
            q,
            SinceQuery::SinceTime {
                since: 1_700_000_000,
                include_scheduled: true
            }
        );
    }

    #[test]
    fn test_known_id_resolves_to_position() {
        let q = SinceQuery::resolve(&SinceMarker::id("abc"), false, |id| {
            assert_eq!(id, "abc");
            Ok(Some(RowPosition(7)))
        })
        .unwrap();
        assert_eq!(
            q,
            SinceQuery::SinceRow {
                position: RowPosition(7),
                include_scheduled: false
            }
        );
    }

    #[test]
    fn test_unknown_id_falls_back_to_all_messages() {
        let q = SinceQuery::resolve(&SinceMarker::id("gone"), true, |_| Ok(None)).unwrap();
        assert_eq!(
            q,
            SinceQuery::SinceTime {
                since: 0,
                include_scheduled: true
            }
        );
    }

    #[test]
    fn test_lookup_error_propagates() {
        let result = SinceQuery::resolve(&SinceMarker::id("x"), false, |_| {
            Err(anyhow::anyhow!("disk on fire"))
        });
        assert!(result.is_err());
    }
}
