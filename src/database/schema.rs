/*!
 * Database schema definitions and migrations.
 *
 * This module contains the SQL schema for all database tables
 * and handles schema migrations for version upgrades.
 */

use anyhow::{Context, Result};
use log::{debug, info};
use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    configure_connection(conn)?;

    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Initializing database schema v{}", SCHEMA_VERSION);
        create_all_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!(
            "Migrating database schema from v{} to v{}",
            current_version, SCHEMA_VERSION
        );
        migrate_schema(conn, current_version)?;
    } else {
        debug!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Per-connection pragmas
fn configure_connection(conn: &Connection) -> Result<()> {
    // WAL for concurrent readers and crash recovery; in-memory databases ignore it
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    Ok(())
}

/// Get the current schema version from the database
fn get_schema_version(conn: &Connection) -> Result<i32> {
    let table_exists: bool = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='schema_version'",
            [],
            |row| row.get(0),
        )
        .context("Failed to check schema_version table existence")?;

    if !table_exists {
        return Ok(0);
    }

    let version: i32 = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .unwrap_or(0);

    Ok(version)
}

/// Set the schema version in the database
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_version (id, version, updated_at) VALUES (1, ?1, datetime('now'))",
        [version],
    )?;
    Ok(())
}

/// Create all database tables
fn create_all_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )?;

    // Requests: filter columns plus the full aggregate as JSON
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS translation_requests (
            id TEXT PRIMARY KEY,
            content_id TEXT NOT NULL,
            source_language TEXT NOT NULL,
            target_language TEXT NOT NULL,
            status TEXT NOT NULL,
            priority INTEGER NOT NULL,
            domain TEXT,
            translator_id TEXT,
            deadline TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            version INTEGER NOT NULL,
            document TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_requests_pending ON translation_requests(status, priority DESC, created_at);
        CREATE INDEX IF NOT EXISTS idx_requests_languages ON translation_requests(source_language, target_language);
        CREATE INDEX IF NOT EXISTS idx_requests_content ON translation_requests(content_id);
        CREATE INDEX IF NOT EXISTS idx_requests_translator ON translation_requests(translator_id);
        CREATE INDEX IF NOT EXISTS idx_requests_created ON translation_requests(created_at);
        "#,
    )?;

    // Append-only audit log
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS workflow_events (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            request_id TEXT NOT NULL REFERENCES translation_requests(id),
            event_type TEXT NOT NULL,
            actor_id TEXT NOT NULL,
            actor_name TEXT NOT NULL,
            actor_role TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            details TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_events_request ON workflow_events(request_id);
        CREATE INDEX IF NOT EXISTS idx_events_timestamp ON workflow_events(timestamp);

        CREATE TRIGGER IF NOT EXISTS workflow_events_no_update
        BEFORE UPDATE ON workflow_events
        BEGIN
            SELECT RAISE(ABORT, 'workflow events are append-only');
        END;

        CREATE TRIGGER IF NOT EXISTS workflow_events_no_delete
        BEFORE DELETE ON workflow_events
        BEGIN
            SELECT RAISE(ABORT, 'workflow events are append-only');
        END;
        "#,
    )?;

    // Translation memory, oldest first by seq
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS tm_entries (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            source_hash TEXT NOT NULL,
            source_text TEXT NOT NULL,
            target_text TEXT NOT NULL,
            source_language TEXT NOT NULL,
            target_language TEXT NOT NULL,
            domain TEXT,
            context TEXT,
            confidence REAL NOT NULL,
            verified INTEGER NOT NULL DEFAULT 0,
            usage_count INTEGER NOT NULL DEFAULT 0,
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_tm_lookup ON tm_entries(source_hash, source_language, target_language);
        "#,
    )?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS glossary_terms (
            id TEXT PRIMARY KEY,
            term TEXT NOT NULL,
            source_language TEXT NOT NULL,
            domain TEXT NOT NULL,
            document TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_glossary_scope ON glossary_terms(source_language, domain);
        "#,
    )?;

    info!("Database schema created successfully");
    Ok(())
}

/// Migrate the schema from one version to another
fn migrate_schema(conn: &Connection, from_version: i32) -> Result<()> {
    if from_version < SCHEMA_VERSION {
        // No released version predates v1
        return Err(anyhow::anyhow!(
            "Unknown schema version: {}. Cannot migrate.",
            from_version
        ));
    }

    set_schema_version(conn, SCHEMA_VERSION)?;
    info!("Schema migration completed to v{}", SCHEMA_VERSION);
    Ok(())
}
