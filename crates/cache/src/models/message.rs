//! Message model representing a single notification on a topic

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of generated message IDs
const MESSAGE_ID_LENGTH: usize = 12;

/// Kind of event carried over a subscriber connection
///
/// Only `Message` events are stored; the others are control frames that
/// exist for the lifetime of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    Open,
    Keepalive,
    Message,
    PollRequest,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::Open => "open",
            Event::Keepalive => "keepalive",
            Event::Message => "message",
            Event::PollRequest => "poll_request",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File attached to a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    /// MIME type, e.g. "image/png"
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub mime_type: String,
    /// Size in bytes
    #[serde(default, skip_serializing_if = "is_zero")]
    pub size: i64,
    /// Unix timestamp after which the file may be deleted (0 = never)
    #[serde(default, skip_serializing_if = "is_zero")]
    pub expires: i64,
    pub url: String,
    /// Identity charged for the attachment's storage quota
    #[serde(skip)]
    pub owner: String,
}

impl Attachment {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mime_type: String::new(),
            size: 0,
            expires: 0,
            url: url.into(),
            owner: String::new(),
        }
    }

    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    pub fn size(mut self, size: i64) -> Self {
        self.size = size;
        self
    }

    pub fn expires(mut self, expires: i64) -> Self {
        self.expires = expires;
        self
    }

    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }
}

/// A notification published to a topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Caller-assigned identifier, unique within a topic by convention only
    pub id: String,
    /// Delivery time (Unix seconds); future values mean "scheduled"
    pub time: i64,
    /// Last modification time (Unix seconds)
    #[serde(default, skip_serializing_if = "is_zero")]
    pub updated: i64,
    pub event: Event,
    pub topic: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "is_zero_u8")]
    pub priority: u8,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub click: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
    /// Body encoding marker, e.g. "base64" for binary-safe bodies
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub encoding: String,
}

impl Message {
    /// Create a new message builder for a topic
    pub fn builder(topic: impl Into<String>) -> MessageBuilder {
        MessageBuilder::new(topic)
    }

    /// Create a bare control event (open, keepalive, ...) for a topic
    pub fn new_event(event: Event, topic: impl Into<String>) -> Self {
        Self::builder(topic).event(event).build()
    }

    /// Whether the message is due at the given instant (Unix seconds)
    pub fn is_due(&self, now: i64) -> bool {
        self.time <= now
    }
}

/// Builder for creating Message instances
pub struct MessageBuilder {
    id: Option<String>,
    time: Option<i64>,
    updated: Option<i64>,
    event: Event,
    topic: String,
    message: String,
    title: String,
    priority: u8,
    tags: Vec<String>,
    click: String,
    attachment: Option<Attachment>,
    encoding: String,
}

impl MessageBuilder {
    fn new(topic: impl Into<String>) -> Self {
        Self {
            id: None,
            time: None,
            updated: None,
            event: Event::Message,
            topic: topic.into(),
            message: String::new(),
            title: String::new(),
            priority: 0,
            tags: Vec::new(),
            click: String::new(),
            attachment: None,
            encoding: String::new(),
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn time(mut self, time: i64) -> Self {
        self.time = Some(time);
        self
    }

    pub fn updated(mut self, updated: i64) -> Self {
        self.updated = Some(updated);
        self
    }

    pub fn event(mut self, event: Event) -> Self {
        self.event = event;
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn click(mut self, click: impl Into<String>) -> Self {
        self.click = click.into();
        self
    }

    pub fn attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    pub fn encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = encoding.into();
        self
    }

    pub fn build(self) -> Message {
        let time = self.time.unwrap_or_else(|| Utc::now().timestamp());
        Message {
            id: self.id.unwrap_or_else(random_id),
            time,
            updated: self.updated.unwrap_or(time),
            event: self.event,
            topic: self.topic,
            message: self.message,
            title: self.title,
            priority: self.priority,
            tags: self.tags,
            click: self.click,
            attachment: self.attachment,
            encoding: self.encoding,
        }
    }
}

/// Generate a short random message ID
fn random_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(MESSAGE_ID_LENGTH);
    id
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

fn is_zero_u8(v: &u8) -> bool {
    *v == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let before = Utc::now().timestamp();
        let msg = Message::builder("alerts").message("disk full").build();

        assert_eq!(msg.topic, "alerts");
        assert_eq!(msg.event, Event::Message);
        assert_eq!(msg.id.len(), MESSAGE_ID_LENGTH);
        assert!(msg.time >= before);
        assert_eq!(msg.updated, msg.time);
        assert!(msg.attachment.is_none());
    }

    #[test]
    fn test_generated_ids_differ() {
        let a = Message::builder("t").build();
        let b = Message::builder("t").build();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_new_event() {
        let msg = Message::new_event(Event::Keepalive, "alerts");
        assert_eq!(msg.event, Event::Keepalive);
        assert_eq!(msg.event.to_string(), "keepalive");
    }

    #[test]
    fn test_is_due() {
        let msg = Message::builder("t").time(100).build();
        assert!(msg.is_due(100));
        assert!(msg.is_due(101));
        assert!(!msg.is_due(99));
    }

    #[test]
    fn test_json_skips_empty_fields_and_owner() {
        let msg = Message::builder("backups")
            .id("abc")
            .time(1_700_000_000)
            .message("done")
            .attachment(
                Attachment::new("log.txt", "https://example.com/file/abc.txt")
                    .size(42)
                    .owner("alice"),
            )
            .build();

        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["event"], "message");
        assert_eq!(json["attachment"]["size"], 42);
        assert!(json["attachment"].get("owner").is_none());
        assert!(json["attachment"].get("type").is_none());
        assert!(json.get("title").is_none());
        assert!(json.get("tags").is_none());
    }

    #[test]
    fn test_parse_poll_request_event() {
        let event: Event = serde_json::from_str("\"poll_request\"").unwrap();
        assert_eq!(event, Event::PollRequest);
    }
}
