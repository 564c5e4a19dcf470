//! Storage repository traits
//!
//! These traits define the storage interface, allowing for different
//! implementations (SQLite, in-memory fakes in tests).

use uuid::Uuid;

use crate::error::Result;
use crate::models::SessionStats;
use crate::session::SessionRecords;
use crate::storage::ArchivedSession;

/// Live session records
pub trait RecordRepository {
    /// Load every record; missing or malformed ones fall back to defaults
    fn load_records(&self) -> Result<SessionRecords>;

    /// Write every record atomically
    fn save_records(&self, records: &SessionRecords) -> Result<()>;
}

/// Ended session recaps
pub trait ArchiveRepository {
    /// Append a recap
    fn archive_session(&self, stats: &SessionStats) -> Result<Uuid>;

    /// Most recent recaps first
    fn recent_sessions(&self, limit: u32) -> Result<Vec<ArchivedSession>>;
}

/// Combined storage trait for convenience
pub trait Storage: RecordRepository + ArchiveRepository {}

impl<T> Storage for T where T: RecordRepository + ArchiveRepository {}
