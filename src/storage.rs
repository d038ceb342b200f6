// Durable key-value backends for the task snapshot

use eyre::{Context, Result, eyre};
use fs2::FileExt;
use rusqlite::{Connection, OptionalExtension};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Key the snapshot is stored under when a backend is keyed
pub const DEFAULT_KEY: &str = "todos";

/// Where the serialized task collection lives between runs
///
/// Backends only move opaque strings; encoding is the store's concern.
pub trait SnapshotStorage {
    /// Read the stored snapshot, `None` if nothing was ever saved
    fn load(&self) -> Result<Option<String>>;

    /// Replace the stored snapshot
    fn save(&mut self, snapshot: &str) -> Result<()>;
}

impl<S: SnapshotStorage + ?Sized> SnapshotStorage for Box<S> {
    fn load(&self) -> Result<Option<String>> {
        (**self).load()
    }

    fn save(&mut self, snapshot: &str) -> Result<()> {
        (**self).save(snapshot)
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// Process-local storage; nothing survives the process
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    value: Option<String>,
    fail_saves: bool,
    saves: usize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an existing snapshot
    pub fn with_snapshot<S: Into<String>>(snapshot: S) -> Self {
        Self {
            value: Some(snapshot.into()),
            ..Self::default()
        }
    }

    /// Make every following save fail, as a full or unavailable store would
    pub fn set_fail_saves(&mut self, fail: bool) {
        self.fail_saves = fail;
    }

    pub fn snapshot(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl SnapshotStorage for MemoryStorage {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.value.clone())
    }

    fn save(&mut self, snapshot: &str) -> Result<()> {
        if self.fail_saves {
            return Err(eyre!("storage quota exceeded"));
        }
        self.value = Some(snapshot.to_string());
        self.saves += 1;
        Ok(())
    }
}

// ============================================================================
// JSON file
// ============================================================================

/// Snapshot kept in a single file
///
/// Saves write a sibling temp file, fsync it and rename it over the target
/// while holding an exclusive lock on `<file>.lock`, so readers never see a
/// half-written snapshot.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| DEFAULT_KEY.into());
        name.push(suffix);
        self.path.with_file_name(name)
    }

    fn open_lock(&self) -> Result<File> {
        OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.sibling(".lock"))
            .context("Failed to open snapshot lock file")
    }
}

impl SnapshotStorage for FileStorage {
    fn load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let lock = self.open_lock()?;
        lock.lock_shared().context("Failed to acquire shared snapshot lock")?;

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read snapshot file {:?}", self.path))?;

        debug!(file = ?self.path, bytes = content.len(), "Read snapshot file");
        Ok(Some(content))
    }

    fn save(&mut self, snapshot: &str) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).context("Failed to create snapshot directory")?;
        }

        let lock = self.open_lock()?;
        // Lock is released when `lock` is dropped
        lock.lock_exclusive().context("Failed to acquire snapshot lock")?;

        let tmp_path = self.sibling(".tmp");
        let mut tmp = File::create(&tmp_path).context("Failed to create temporary snapshot file")?;
        tmp.write_all(snapshot.as_bytes())?;
        tmp.sync_all()?;
        drop(tmp);

        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to move snapshot into place at {:?}", self.path))?;

        debug!(file = ?self.path, bytes = snapshot.len(), "Wrote snapshot file");
        Ok(())
    }
}

// ============================================================================
// SQLite key-value table
// ============================================================================

/// Snapshot kept under a key in a SQLite `local_storage` table
pub struct SqliteStorage {
    db: Connection,
    key: String,
}

impl SqliteStorage {
    /// Open or create the database at `path`
    pub fn open<P: AsRef<Path>>(path: P, key: &str) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).context("Failed to create database directory")?;
        }
        let db = Connection::open(path.as_ref()).context("Failed to open SQLite database")?;
        Self::from_connection(db, key)
    }

    pub fn open_in_memory(key: &str) -> Result<Self> {
        let db = Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        Self::from_connection(db, key)
    }

    fn from_connection(db: Connection, key: &str) -> Result<Self> {
        if key.trim().is_empty() {
            return Err(eyre!("Storage key cannot be empty"));
        }

        let storage = Self {
            db,
            key: key.to_string(),
        };
        storage.create_schema()?;
        Ok(storage)
    }

    fn create_schema(&self) -> Result<()> {
        debug!("Creating local_storage schema");

        self.db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS local_storage (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;

        Ok(())
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get a reference to the SQLite database connection
    pub fn db(&self) -> &Connection {
        &self.db
    }
}

impl SnapshotStorage for SqliteStorage {
    fn load(&self) -> Result<Option<String>> {
        let value = self
            .db
            .query_row("SELECT value FROM local_storage WHERE key = ?1", [&self.key], |row| {
                row.get::<_, String>(0)
            })
            .optional()
            .context("Failed to read snapshot from SQLite")?;

        Ok(value)
    }

    fn save(&mut self, snapshot: &str) -> Result<()> {
        self.db
            .execute(
                "INSERT OR REPLACE INTO local_storage (key, value) VALUES (?1, ?2)",
                rusqlite::params![&self.key, snapshot],
            )
            .context("Failed to write snapshot to SQLite")?;

        debug!(key = %self.key, bytes = snapshot.len(), "Wrote snapshot row");
        Ok(())
    }
}
