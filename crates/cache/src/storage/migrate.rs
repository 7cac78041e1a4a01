//! Schema setup and migrations for the SQLite message cache
//!
//! The schema version lives in a single-row `schemaVersion` table. A store
//! that predates that table is version 0. Each migration moves the schema
//! exactly one version forward inside its own transaction, so a failure
//! leaves the file at the previous version and the next startup retries.

use anyhow::{Context, Result};
use log::{debug, info};
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::CacheError;

/// Schema version written by this build
pub const CURRENT_SCHEMA_VERSION: u32 = 6;

const CREATE_MESSAGES_TABLE: &str = r#"
    CREATE TABLE messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        mid TEXT NOT NULL,
        time INT NOT NULL,
        updated INT NOT NULL,
        topic TEXT NOT NULL,
        message TEXT NOT NULL,
        title TEXT NOT NULL,
        priority INT NOT NULL,
        tags TEXT NOT NULL,
        click TEXT NOT NULL,
        attachment_name TEXT NOT NULL,
        attachment_type TEXT NOT NULL,
        attachment_size INT NOT NULL,
        attachment_expires INT NOT NULL,
        attachment_url TEXT NOT NULL,
        attachment_owner TEXT NOT NULL,
        encoding TEXT NOT NULL,
        published INT NOT NULL
    );
    CREATE INDEX idx_mid ON messages (mid);
    CREATE INDEX idx_topic ON messages (topic);
"#;

const CREATE_SCHEMA_VERSION_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS schemaVersion (
        id INT PRIMARY KEY,
        version INT NOT NULL
    );
"#;

/// Body of a migration step, run inside the step's transaction
pub(crate) enum Step {
    Sql(&'static str),
    Func(fn(&Connection) -> Result<()>),
}

/// A single schema step from `from` to `from + 1`
pub(crate) struct Migration {
    pub from: u32,
    pub step: Step,
}

impl Migration {
    pub(crate) const fn up(from: u32, sql: &'static str) -> Self {
        Self {
            from,
            step: Step::Sql(sql),
        }
    }

    pub(crate) const fn up_with(from: u32, func: fn(&Connection) -> Result<()>) -> Self {
        Self {
            from,
            step: Step::Func(func),
        }
    }
}

/// Ordered migration chain
///
/// Adding a schema version means appending one entry here and bumping
/// `CURRENT_SCHEMA_VERSION`.
pub(crate) fn migrations() -> Vec<Migration> {
    vec![
        // 0 -> 1: display fields
        Migration::up(
            0,
            r#"
            ALTER TABLE messages ADD COLUMN title TEXT NOT NULL DEFAULT('');
            ALTER TABLE messages ADD COLUMN priority INT NOT NULL DEFAULT(0);
            ALTER TABLE messages ADD COLUMN tags TEXT NOT NULL DEFAULT('');
            "#,
        ),
        // 1 -> 2: scheduled delivery; everything stored so far was delivered
        Migration::up(
            1,
            r#"
            ALTER TABLE messages ADD COLUMN published INT NOT NULL DEFAULT(1);
            "#,
        ),
        // 2 -> 3: click action and attachments
        Migration::up(
            2,
            r#"
            ALTER TABLE messages ADD COLUMN click TEXT NOT NULL DEFAULT('');
            ALTER TABLE messages ADD COLUMN attachment_name TEXT NOT NULL DEFAULT('');
            ALTER TABLE messages ADD COLUMN attachment_type TEXT NOT NULL DEFAULT('');
            ALTER TABLE messages ADD COLUMN attachment_size INT NOT NULL DEFAULT(0);
            ALTER TABLE messages ADD COLUMN attachment_expires INT NOT NULL DEFAULT(0);
            ALTER TABLE messages ADD COLUMN attachment_owner TEXT NOT NULL DEFAULT('');
            ALTER TABLE messages ADD COLUMN attachment_url TEXT NOT NULL DEFAULT('');
            "#,
        ),
        // 3 -> 4: body encoding
        Migration::up(
            3,
            r#"
            ALTER TABLE messages ADD COLUMN encoding TEXT NOT NULL DEFAULT('');
            "#,
        ),
        // 4 -> 5: rebuild with an autoincrement row position, message ID moves to `mid`
        Migration::up(
            4,
            r#"
            CREATE TABLE messages_new (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                mid TEXT NOT NULL,
                time INT NOT NULL,
                topic TEXT NOT NULL,
                message TEXT NOT NULL,
                title TEXT NOT NULL,
                priority INT NOT NULL,
                tags TEXT NOT NULL,
                click TEXT NOT NULL,
                attachment_name TEXT NOT NULL,
                attachment_type TEXT NOT NULL,
                attachment_size INT NOT NULL,
                attachment_expires INT NOT NULL,
                attachment_url TEXT NOT NULL,
                attachment_owner TEXT NOT NULL,
                encoding TEXT NOT NULL,
                published INT NOT NULL
            );
            INSERT INTO messages_new (
                mid, time, topic, message, title, priority, tags, click,
                attachment_name, attachment_type, attachment_size, attachment_expires,
                attachment_url, attachment_owner, encoding, published)
            SELECT
                id, time, topic, message, title, priority, tags, click,
                attachment_name, attachment_type, attachment_size, attachment_expires,
                attachment_url, attachment_owner, encoding, published
            FROM messages
            ORDER BY rowid;
            DROP TABLE messages;
            ALTER TABLE messages_new RENAME TO messages;
            CREATE INDEX idx_mid ON messages (mid);
            CREATE INDEX idx_topic ON messages (topic);
            "#,
        ),
        // 5 -> 6: last modification time, backfilled from delivery time
        Migration::up_with(5, add_updated_column),
    ]
}

/// Bring the database to `CURRENT_SCHEMA_VERSION`
///
/// Creates the schema directly on an empty database; otherwise applies
/// every migration between the stored version and the current one.
pub fn setup(conn: &mut Connection) -> Result<()> {
    run(conn, &migrations(), CURRENT_SCHEMA_VERSION)
}

pub(crate) fn run(conn: &mut Connection, steps: &[Migration], target: u32) -> Result<()> {
    if !table_exists(conn, "messages")? {
        return create_fresh(conn, target);
    }

    let mut version = stored_version(conn)?;
    if version > target {
        return Err(CacheError::FutureSchema {
            found: version,
            current: target,
        }
        .into());
    }

    while version < target {
        let step = steps
            .iter()
            .find(|m| m.from == version)
            .ok_or(CacheError::MissingMigration(version))?;
        apply(conn, step)?;
        version += 1;
    }

    Ok(())
}

fn create_fresh(conn: &mut Connection, version: u32) -> Result<()> {
    debug!("Creating cache database schema at version {}", version);
    let tx = conn.transaction()?;
    tx.execute_batch(CREATE_MESSAGES_TABLE)?;
    tx.execute_batch(CREATE_SCHEMA_VERSION_TABLE)?;
    tx.execute(
        "INSERT INTO schemaVersion (id, version) VALUES (1, ?)",
        params![version],
    )?;
    tx.commit()?;
    Ok(())
}

fn apply(conn: &mut Connection, step: &Migration) -> Result<()> {
    let to = step.from + 1;
    info!("Migrating cache database schema: from {} to {}", step.from, to);

    let tx = conn.transaction()?;
    let result = match &step.step {
        Step::Sql(sql) => tx.execute_batch(sql).map_err(anyhow::Error::from),
        Step::Func(func) => func(&tx),
    };
    result.with_context(|| format!("Failed to migrate cache schema from {} to {}", step.from, to))?;
    if step.from == 0 {
        tx.execute_batch(CREATE_SCHEMA_VERSION_TABLE)?;
        tx.execute(
            "INSERT INTO schemaVersion (id, version) VALUES (1, ?)",
            params![to],
        )?;
    } else {
        tx.execute(
            "UPDATE schemaVersion SET version = ? WHERE id = 1",
            params![to],
        )?;
    }
    tx.commit()?;
    Ok(())
}

/// Add `updated` to a version-5 table that lacks it
///
/// Version 5 stores created from scratch already carry the column; their
/// values are kept.
fn add_updated_column(conn: &Connection) -> Result<()> {
    if column_exists(conn, "messages", "updated")? {
        debug!("Column messages.updated already present");
        return Ok(());
    }
    conn.execute_batch(
        r#"
        ALTER TABLE messages ADD COLUMN updated INT NOT NULL DEFAULT(0);
        UPDATE messages SET updated = time;
        "#,
    )?;
    Ok(())
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names.iter().any(|name| name == column))
}

/// Read the schema version of an existing database
///
/// A database without a version table predates versioning and is version 0.
pub(crate) fn stored_version(conn: &Connection) -> Result<u32> {
    if !table_exists(conn, "schemaVersion")? {
        return Ok(0);
    }
    let version: Option<u32> = conn
        .query_row("SELECT version FROM schemaVersion WHERE id = 1", [], |row| {
            row.get(0)
        })
        .optional()?;
    version.ok_or_else(|| CacheError::CorruptSchema.into())
}

fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        [name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
