/*!
 * SQLite handle shared by the workflow repository, the translation memory
 * and the glossary.
 *
 * One connection sits behind a mutex. Async callers go through
 * `spawn_blocking`; multi-statement writes (a request commit and its events,
 * a TM entry and the rows it replaces) use `transaction_async`.
 */

use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use rusqlite::{Connection, Transaction};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use super::schema;

const DB_FILENAME: &str = "locflow.db";
const DB_DIRNAME: &str = "locflow";

/// Marker path of the in-memory store
const IN_MEMORY: &str = ":memory:";

/// Shared workflow store
#[derive(Clone)]
pub struct DatabaseConnection {
    db_path: PathBuf,
    connection: Arc<Mutex<Connection>>,
}

impl DatabaseConnection {
    /// Store under the user's local data directory
    pub fn new_default() -> Result<Self> {
        Self::new(Self::default_database_path()?)
    }

    /// Open (or create) the store at `db_path`, creating missing parent
    /// directories and applying the schema
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data directory: {:?}", parent))?;
        }

        info!("Opening workflow store at {:?}", db_path);
        let conn = Connection::open(&db_path)
            .with_context(|| format!("Failed to open workflow store: {:?}", db_path))?;

        Self::with_schema(conn, db_path)
    }

    /// Throwaway store, used by tests and dry runs
    pub fn new_in_memory() -> Result<Self> {
        debug!("Opening in-memory workflow store");
        let conn = Connection::open_in_memory().context("Failed to open in-memory workflow store")?;

        Self::with_schema(conn, PathBuf::from(IN_MEMORY))
    }

    fn with_schema(conn: Connection, db_path: PathBuf) -> Result<Self> {
        schema::initialize_schema(&conn)?;
        Ok(Self {
            db_path,
            connection: Arc::new(Mutex::new(conn)),
        })
    }

    /// `<data dir>/locflow/locflow.db`, falling back to `~/.local/share`
    pub fn default_database_path() -> Result<PathBuf> {
        let base_dir = dirs::data_local_dir()
            .or_else(dirs::data_dir)
            .or_else(|| dirs::home_dir().map(|h| h.join(".local").join("share")))
            .ok_or_else(|| anyhow!("Could not determine a data directory for the workflow store"))?;

        Ok(base_dir.join(DB_DIRNAME).join(DB_FILENAME))
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    pub fn is_in_memory(&self) -> bool {
        self.db_path.as_os_str() == IN_MEMORY
    }

    fn lock(connection: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
        connection
            .lock()
            .map_err(|e| anyhow!("Workflow store lock poisoned: {}", e))
    }

    /// Run `f` on the calling thread
    pub fn execute<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = Self::lock(&self.connection)?;
        f(&conn)
    }

    /// Run `f` on the blocking pool
    pub async fn execute_async<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let connection = self.connection.clone();

        tokio::task::spawn_blocking(move || {
            let conn = Self::lock(&connection)?;
            f(&conn)
        })
        .await
        .context("Workflow store task panicked")?
    }

    /// Run `f` inside a transaction; it commits only when `f` returns `Ok`
    pub async fn transaction_async<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let connection = self.connection.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = Self::lock(&connection)?;
            let tx = conn.transaction()?;
            let result = f(&tx)?;
            tx.commit()?;
            Ok(result)
        })
        .await
        .context("Workflow store transaction panicked")?
    }

    /// Row counts per table and the file size
    pub fn stats(&self) -> Result<DatabaseStats> {
        self.execute(|conn| {
            let count = |table: &str| -> Result<i64> {
                Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?)
            };

            let file_size_bytes = if self.is_in_memory() {
                0
            } else {
                std::fs::metadata(&self.db_path).map(|m| m.len()).unwrap_or(0)
            };

            Ok(DatabaseStats {
                request_count: count("translation_requests")?,
                event_count: count("workflow_events")?,
                tm_entry_count: count("tm_entries")?,
                glossary_term_count: count("glossary_terms")?,
                file_size_bytes,
            })
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseStats {
    pub request_count: i64,
    pub event_count: i64,
    pub tm_entry_count: i64,
    pub glossary_term_count: i64,
    pub file_size_bytes: u64,
}

impl std::fmt::Display for DatabaseStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} requests, {} events, {} TM entries, {} glossary terms ({} KB)",
            self.request_count,
            self.event_count,
            self.tm_entry_count,
            self.glossary_term_count,
            self.file_size_bytes / 1024
        )
    }
}
