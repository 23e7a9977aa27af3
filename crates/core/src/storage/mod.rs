//! SQLite storage layer for Patron
//!
//! One small database per browser-profile-equivalent: a flat key-value
//! table standing in for local storage, with typed stores layered over
//! the namespaces the engine uses (session slot, per-account profile
//! extras, preferences).

mod extras;
mod kv;
mod migrations;
mod parse;
mod preferences;
mod session;

use std::path::{Path, PathBuf};

use rusqlite::Connection;
use tracing::instrument;

use crate::error::{Error, Result};

pub use extras::ExtrasStore;
pub use kv::KvStore;
pub use parse::{is_usable_token, safe_parse};
pub use preferences::PreferencesStore;
pub use session::SessionStore;

/// Main database handle
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Open the database at the platform-default data location
    pub fn open_default() -> Result<Self> {
        let path = Self::default_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Open in-memory database (for testing)
    #[instrument]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Platform-default database path
    pub fn default_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("app", "patron", "patron").ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not determine data directory",
            ))
        })?;

        Ok(dirs.data_dir().join("patron.db"))
    }

    /// Initialize database schema via migrations
    fn init(&self) -> Result<()> {
        migrations::run_migrations(&self.conn)?;
        Ok(())
    }

    /// Get current schema version
    pub fn schema_version(&self) -> u32 {
        self.conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap_or(0)
    }

    /// Raw key-value store
    pub fn kv(&self) -> KvStore<'_> {
        KvStore::new(&self.conn)
    }

    /// Session slot store (current user blob + bearer token)
    pub fn session(&self) -> SessionStore<'_> {
        SessionStore::new(&self.conn)
    }

    /// Per-account profile-extra cache
    pub fn extras(&self) -> ExtrasStore<'_> {
        ExtrasStore::new(&self.conn)
    }

    /// Preferences store (sound toggle, visibility flags)
    pub fn preferences(&self) -> PreferencesStore<'_> {
        PreferencesStore::new(&self.conn)
    }
}
