//! SQLite-backed message cache
//!
//! Serves both the durable file mode and the ephemeral in-memory mode. The
//! in-memory mode uses a named shared-cache database so that every
//! connection opened for it sees the same data.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use log::debug;
use rusqlite::{Connection, OptionalExtension, Params, Row, params};

use super::ensure_storable;
use super::migrate;
use super::query::{RowPosition, SinceQuery};
use super::traits::MessageCache;
use crate::error::CacheError;
use crate::models::{Attachment, Event, Message, SinceMarker, Topic};

/// Separator used to flatten tags into a single column
const TAG_SEPARATOR: &str = ",";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const INSERT_MESSAGE: &str = r#"
    INSERT INTO messages (
        mid, time, updated, topic, message, title, priority, tags, click,
        attachment_name, attachment_type, attachment_size, attachment_expires,
        attachment_url, attachment_owner, encoding, published)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const UPDATE_MESSAGE: &str = r#"
    UPDATE messages
    SET updated = ?, message = ?, title = ?, priority = ?, tags = ?, click = ?
    WHERE topic = ? AND mid = ?
"#;

/// Column list shared by every query that returns messages; see `read_message`
const MESSAGE_COLUMNS: &str = "mid, time, updated, topic, message, title, priority, tags, click, \
     attachment_name, attachment_type, attachment_size, attachment_expires, \
     attachment_url, attachment_owner, encoding";

/// Where the database lives, needed to open additional connections
#[derive(Debug, Clone)]
enum Location {
    File(PathBuf),
    SharedMemory(String),
}

/// SQLite-based message cache
pub struct SqliteCache {
    conn: Mutex<Connection>,
    location: Location,
}

impl SqliteCache {
    /// Open (or create) a cache file, migrating its schema if needed
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create cache directory {}", parent.display())
            })?;
        }
        Self::connect(Location::File(path.to_path_buf()))
    }

    /// Create an ephemeral cache that lives as long as any of its handles
    pub fn open_in_memory() -> Result<Self> {
        let name = uuid::Uuid::new_v4().simple().to_string();
        Self::connect(Location::SharedMemory(format!(
            "file:beacon-{}?mode=memory&cache=shared",
            name
        )))
    }

    /// Open another connection to the same database
    ///
    /// For the in-memory mode the new handle shares the original's data
    /// rather than starting from an empty database. Shared-cache connections
    /// report table contention as `SQLITE_LOCKED`, which the busy timeout
    /// does not retry, so writes racing across in-memory clones can fail with
    /// "database table is locked". Concurrent writers should share one
    /// `SqliteCache` (e.g. behind an `Arc`); clones suit handles that take
    /// turns.
    pub fn try_clone(&self) -> Result<Self> {
        Self::connect(self.location.clone())
    }

    fn connect(location: Location) -> Result<Self> {
        let mut conn = match &location {
            Location::File(path) => {
                let conn = Connection::open(path)
                    .with_context(|| format!("Failed to open cache database at {:?}", path))?;
                // WAL lets subscriber replays read while the ingest path writes
                conn.execute_batch(
                    r#"
                    PRAGMA journal_mode = WAL;
                    PRAGMA synchronous = NORMAL;
                    "#,
                )?;
                conn
            }
            Location::SharedMemory(uri) => Connection::open(uri)
                .with_context(|| format!("Failed to open in-memory cache {}", uri))?,
        };
        conn.busy_timeout(BUSY_TIMEOUT)?;

        migrate::setup(&mut conn).context("Failed to set up cache database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
            location,
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("cache connection lock poisoned"))
    }

    /// Find the row position of a message in a topic
    fn position_of(conn: &Connection, topic: &str, id: &str) -> Result<Option<RowPosition>> {
        let position = conn
            .query_row(
                "SELECT id FROM messages WHERE topic = ? AND mid = ? ORDER BY id LIMIT 1",
                params![topic, id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(position.map(RowPosition))
    }
}

impl MessageCache for SqliteCache {
    fn add_message(&self, message: &Message) -> Result<()> {
        ensure_storable(message)?;

        let published = message.is_due(Utc::now().timestamp());
        let empty = Attachment::new("", "");
        let attachment = message.attachment.as_ref().unwrap_or(&empty);

        let conn = self.conn()?;
        conn.execute(
            INSERT_MESSAGE,
            params![
                message.id,
                message.time,
                message.updated,
                message.topic,
                message.message,
                message.title,
                message.priority,
                join_tags(&message.tags),
                message.click,
                attachment.name,
                attachment.mime_type,
                attachment.size,
                attachment.expires,
                attachment.url,
                attachment.owner,
                message.encoding,
                published,
            ],
        )?;

        Ok(())
    }

    fn update_message(&self, message: &Message) -> Result<()> {
        ensure_storable(message)?;

        let conn = self.conn()?;
        conn.execute(
            UPDATE_MESSAGE,
            params![
                message.updated,
                message.message,
                message.title,
                message.priority,
                join_tags(&message.tags),
                message.click,
                message.topic,
                message.id,
            ],
        )?;

        Ok(())
    }

    fn messages(
        &self,
        topic: &str,
        since: &SinceMarker,
        include_scheduled: bool,
    ) -> Result<Vec<Message>> {
        if since.is_none() {
            return Ok(Vec::new());
        }

        let conn = self.conn()?;
        let query = SinceQuery::resolve(since, include_scheduled, |id| {
            Self::position_of(&conn, topic, id)
        })?;

        match query {
            SinceQuery::Empty => Ok(Vec::new()),
            SinceQuery::SinceTime {
                since,
                include_scheduled: false,
            } => query_messages(
                &conn,
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages
                     WHERE topic = ? AND time >= ? AND published = 1
                     ORDER BY time, id"
                ),
                params![topic, since],
            ),
            SinceQuery::SinceTime {
                since,
                include_scheduled: true,
            } => query_messages(
                &conn,
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages
                     WHERE topic = ? AND time >= ?
                     ORDER BY time, id"
                ),
                params![topic, since],
            ),
            SinceQuery::SinceRow {
                position,
                include_scheduled: false,
            } => query_messages(
                &conn,
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages
                     WHERE topic = ? AND id > ? AND published = 1
                     ORDER BY time, id"
                ),
                params![topic, position.0],
            ),
            SinceQuery::SinceRow {
                position,
                include_scheduled: true,
            } => query_messages(
                &conn,
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages
                     WHERE topic = ? AND (id > ? OR published = 0)
                     ORDER BY time, id"
                ),
                params![topic, position.0],
            ),
        }
    }

    fn message(&self, topic: &str, id: &str) -> Result<Message> {
        let conn = self.conn()?;
        let messages = query_messages(
            &conn,
            &format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE topic = ? AND mid = ?
                 ORDER BY time, id
                 LIMIT 1"
            ),
            params![topic, id],
        )?;

        messages.into_iter().next().ok_or_else(|| {
            CacheError::NotFound {
                topic: topic.to_string(),
                id: id.to_string(),
            }
            .into()
        })
    }

    fn messages_due(&self) -> Result<Vec<Message>> {
        let conn = self.conn()?;
        query_messages(
            &conn,
            &format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE time <= ? AND published = 0
                 ORDER BY time, id"
            ),
            params![Utc::now().timestamp()],
        )
    }

    fn mark_published(&self, message: &Message) -> Result<()> {
        let conn = self.conn()?;
        // Matches on ID alone: a reused ID flips rows in every topic
        conn.execute(
            "UPDATE messages SET published = 1 WHERE mid = ?",
            [&message.id],
        )?;
        Ok(())
    }

    fn message_count(&self, topic: &str) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE topic = ?",
            [topic],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn topics(&self) -> Result<Vec<Topic>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT topic FROM messages GROUP BY topic ORDER BY topic")?;
        let topics = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .map(|id| id.map(Topic::new))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(topics)
    }

    fn prune(&self, older_than: DateTime<Utc>) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM messages WHERE time < ? AND published = 1",
            [older_than.timestamp()],
        )?;
        debug!("Pruned {} messages older than {}", deleted, older_than);
        Ok(())
    }

    fn attachments_size(&self, owner: &str) -> Result<i64> {
        let conn = self.conn()?;
        let size: i64 = conn.query_row(
            "SELECT IFNULL(SUM(attachment_size), 0) FROM messages
             WHERE attachment_owner = ? AND attachment_expires >= ?",
            params![owner, Utc::now().timestamp()],
            |row| row.get(0),
        )?;
        Ok(size)
    }

    fn attachments_expired(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT mid FROM messages WHERE attachment_expires > 0 AND attachment_expires < ?",
        )?;
        let ids = stmt
            .query_map([Utc::now().timestamp()], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }
}

fn query_messages<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<Message>> {
    let mut stmt = conn.prepare(sql)?;
    let messages = stmt
        .query_map(params, read_message)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(messages)
}

/// Build a Message from a row selected with `MESSAGE_COLUMNS`
fn read_message(row: &Row<'_>) -> rusqlite::Result<Message> {
    let tags: String = row.get(7)?;
    let attachment_name: String = row.get(9)?;
    let attachment_url: String = row.get(13)?;

    // Both name and URL are needed for a usable attachment
    let attachment = if !attachment_name.is_empty() && !attachment_url.is_empty() {
        Some(Attachment {
            name: attachment_name,
            mime_type: row.get(10)?,
            size: row.get(11)?,
            expires: row.get(12)?,
            url: attachment_url,
            owner: row.get(14)?,
        })
    } else {
        None
    };

    Ok(Message {
        id: row.get(0)?,
        time: row.get(1)?,
        updated: row.get(2)?,
        event: Event::Message,
        topic: row.get(3)?,
        message: row.get(4)?,
        title: row.get(5)?,
        priority: row.get(6)?,
        tags: split_tags(&tags),
        click: row.get(8)?,
        attachment,
        encoding: row.get(15)?,
    })
}

fn join_tags(tags: &[String]) -> String {
    tags.join(TAG_SEPARATOR)
}

fn split_tags(tags: &str) -> Vec<String> {
    if tags.is_empty() {
        return Vec::new();
    }
    tags.split(TAG_SEPARATOR).map(str::to_string).collect()
}
