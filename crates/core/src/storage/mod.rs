//! SQLite storage layer for Talkstick

mod archive;
mod migrations;
mod parse;
mod records;
mod traits;

use rusqlite::Connection;
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::models::SessionStats;
use crate::session::SessionRecords;

pub use archive::{ArchiveStore, ArchivedSession};
pub use records::RecordStore;
pub use traits::{ArchiveRepository, RecordRepository, Storage};

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

    /// Open in-memory database (for testing)
    #[instrument]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initialize database schema via migrations
    fn init(&self) -> Result<()> {
        migrations::run_migrations(&self.conn)
    }

    /// Get current schema version
    pub fn schema_version(&self) -> u32 {
        migrations::get_current_version(&self.conn).unwrap_or(0)
    }

    pub fn records(&self) -> RecordStore<'_> {
        RecordStore::new(&self.conn)
    }

    pub fn archive(&self) -> ArchiveStore<'_> {
        ArchiveStore::new(&self.conn)
    }
}

/// Load one record, treating anything unreadable as absent.
///
/// A bad payload (invalid JSON, a BLOB, non-UTF-8 text) must never keep a
/// session from starting, so every per-key failure degrades to the default.
fn load_lenient<T: DeserializeOwned>(store: &RecordStore<'_>, key: &str) -> Option<T> {
    match store.load(key) {
        Ok(value) => value,
        Err(e) => {
            warn!(key, error = %e, "Unreadable session record, using default");
            None
        }
    }
}

impl RecordRepository for Database {
    #[instrument(skip(self))]
    fn load_records(&self) -> Result<SessionRecords> {
        let store = self.records();
        let records = SessionRecords {
            roster: load_lenient(&store, records::ROSTER).unwrap_or_default(),
            topics: load_lenient(&store, records::TOPICS).unwrap_or_default(),
            token: load_lenient(&store, records::TOKEN),
            ledger: load_lenient(&store, records::LEDGER).unwrap_or_default(),
            settings: load_lenient(&store, records::SETTINGS),
            last_stats: load_lenient::<Option<SessionStats>>(&store, records::LAST_STATS).flatten(),
            started_at: load_lenient::<Option<_>>(&store, records::STARTED_AT).flatten(),
        };
        debug!(
            participants = records.roster.len(),
            topics = records.topics.len(),
            entries = records.ledger.len(),
            "Loaded session records"
        );
        Ok(records)
    }

    #[instrument(skip(self, records))]
    fn save_records(&self, records: &SessionRecords) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let store = RecordStore::new(&tx);
            store.save(records::ROSTER, &records.roster)?;
            store.save(records::TOPICS, &records.topics)?;
            match &records.token {
                Some(token) => store.save(records::TOKEN, token)?,
                None => store.delete(records::TOKEN)?,
            }
            store.save(records::LEDGER, &records.ledger)?;
            match &records.settings {
                Some(settings) => store.save(records::SETTINGS, settings)?,
                None => store.delete(records::SETTINGS)?,
            }
            store.save(records::LAST_STATS, &records.last_stats)?;
            store.save(records::STARTED_AT, &records.started_at)?;
        }
        tx.commit()?;
        Ok(())
    }
}

impl ArchiveRepository for Database {
    fn archive_session(&self, stats: &SessionStats) -> Result<Uuid> {
        self.archive().append(stats)
    }

    fn recent_sessions(&self, limit: u32) -> Result<Vec<ArchivedSession>> {
        self.archive().list_recent(limit)
    }
}
