/*!
 * SQLite handle for the checkpoint store.
 *
 * One connection per database file, shared behind a lock. Queries run on
 * tokio's blocking pool so a slow disk never stalls translation workers.
 */

use anyhow::{Context, Result};
use log::{debug, info};
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::schema;

/// File name of the checkpoint database inside the data directory
const DB_FILENAME: &str = "checkpoints.db";

/// How long a write waits for another process holding the file
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared connection to the checkpoint database
#[derive(Clone)]
pub struct DatabaseConnection {
    location: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

impl DatabaseConnection {
    /// Open `<data dir>/chapterwise/checkpoints.db`
    pub fn new_default() -> Result<Self> {
        let data_dir = dirs::data_local_dir()
            .or_else(dirs::data_dir)
            .context("No user data directory to keep checkpoints in")?;
        Self::new(data_dir.join("chapterwise").join(DB_FILENAME))
    }

    /// Open (or create) the database file at `db_path`
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let location = db_path.as_ref().to_path_buf();
        if let Some(parent) = location.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create checkpoint directory {:?}", parent))?;
        }

        info!("Checkpoints are kept in {:?}", location);
        let conn = Connection::open(&location)
            .with_context(|| format!("Failed to open checkpoint database {:?}", location))?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        Self::prepared(conn, location)
    }

    /// Private database that disappears with the handle
    pub fn new_in_memory() -> Result<Self> {
        debug!("Using an in-memory checkpoint database");
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::prepared(conn, PathBuf::from(":memory:"))
    }

    fn prepared(conn: Connection, location: PathBuf) -> Result<Self> {
        schema::initialize_schema(&conn)
            .with_context(|| format!("Checkpoint database {:?} is unusable", location))?;
        Ok(Self {
            location,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// File backing this handle, `:memory:` for in-memory databases
    pub fn path(&self) -> &Path {
        &self.location
    }

    /// Run `f` against the connection on the blocking pool
    pub async fn execute_async<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || f(&conn.lock()))
            .await
            .context("Checkpoint database task panicked")?
    }
}
