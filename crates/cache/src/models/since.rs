//! Replay cursor supplied by subscribers catching up on a topic

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::convert::Infallible;
use std::str::FromStr;

/// Marker telling the cache which messages a subscriber has already seen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinceMarker {
    /// No replay at all
    None,
    /// Everything from the beginning of time
    AllMessages,
    /// Messages at or after the given instant
    Time(DateTime<Utc>),
    /// Messages stored after the message with this ID
    Id(String),
}

impl SinceMarker {
    /// Marker for messages at or after the given Unix timestamp (seconds)
    pub fn from_unix(secs: i64) -> Self {
        match Utc.timestamp_opt(secs, 0).single() {
            Some(t) => SinceMarker::Time(t),
            None => SinceMarker::AllMessages,
        }
    }

    pub fn id(id: impl Into<String>) -> Self {
        SinceMarker::Id(id.into())
    }

    /// Parse a `since=` query value relative to the current time
    ///
    /// Accepted forms: empty or "none", "all", a Unix timestamp, a duration
    /// such as "10m" or "2h" (relative to now), otherwise a message ID.
    pub fn parse(s: &str) -> Self {
        Self::parse_at(s, Utc::now())
    }

    /// Like [`SinceMarker::parse`] with an explicit reference time
    pub fn parse_at(s: &str, now: DateTime<Utc>) -> Self {
        let s = s.trim();
        if s.is_empty() || s == "none" {
            return SinceMarker::None;
        }
        if s == "all" {
            return SinceMarker::AllMessages;
        }
        if s.bytes().all(|b| b.is_ascii_digit()) {
            return match s.parse::<i64>() {
                Ok(secs) => Self::from_unix(secs),
                Err(_) => SinceMarker::Id(s.to_string()),
            };
        }
        if let Some(duration) = parse_duration(s) {
            // Reaching back past the earliest representable instant means everything
            return match now.checked_sub_signed(duration) {
                Some(t) => SinceMarker::Time(t),
                None => SinceMarker::AllMessages,
            };
        }
        SinceMarker::Id(s.to_string())
    }

    pub fn is_none(&self) -> bool {
        matches!(self, SinceMarker::None)
    }
}

impl FromStr for SinceMarker {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

/// Parse "<n>s", "<n>m", "<n>h" or "<n>d"
fn parse_duration(s: &str) -> Option<Duration> {
    let unit = s.chars().last()?;
    let digits = &s[..s.len() - unit.len_utf8()];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let n: i64 = digits.parse().ok()?;
    match unit {
        's' => Duration::try_seconds(n),
        'm' => Duration::try_minutes(n),
        'h' => Duration::try_hours(n),
        'd' => Duration::try_days(n),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_parse_none_and_all() {
        assert_eq!(SinceMarker::parse_at("", now()), SinceMarker::None);
        assert_eq!(SinceMarker::parse_at("none", now()), SinceMarker::None);
        assert_eq!(SinceMarker::parse_at("all", now()), SinceMarker::AllMessages);
    }

    #[test]
    fn test_parse_unix_timestamp() {
        assert_eq!(
            SinceMarker::parse_at("1699999000", now()),
            SinceMarker::Time(Utc.timestamp_opt(1_699_999_000, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(
            SinceMarker::parse_at("10m", now()),
            SinceMarker::Time(now() - Duration::minutes(10))
        );
        assert_eq!(
            SinceMarker::parse_at("2d", now()),
            SinceMarker::Time(now() - Duration::days(2))
        );
    }

    #[test]
    fn test_parse_huge_duration_means_all() {
        assert_eq!(
            SinceMarker::parse_at("100000000d", now()),
            SinceMarker::AllMessages
        );
        assert_eq!(SinceMarker::parse("100000000d"), SinceMarker::AllMessages);
    }

    #[test]
    fn test_parse_message_id() {
        assert_eq!(
            SinceMarker::parse_at("a1b2c3d4e5f6", now()),
            SinceMarker::Id("a1b2c3d4e5f6".to_string())
        );
        // A trailing unit letter alone does not make a duration
        assert_eq!(SinceMarker::parse_at("m", now()), SinceMarker::Id("m".to_string()));
    }

    #[test]
    fn test_from_str() {
        let marker: SinceMarker = "all".parse().unwrap();
        assert_eq!(marker, SinceMarker::AllMessages);
    }
}
