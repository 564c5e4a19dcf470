//! Archive of ended sessions

use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use crate::error::Result;
use crate::models::SessionStats;
use crate::storage::parse::{parse_uuid, OptionalExt};

/// One ended session as stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedSession {
    pub id: Uuid,
    pub stats: SessionStats,
}

/// Archive store over `session_archive`
pub struct ArchiveStore<'a> {
    conn: &'a Connection,
}

impl<'a> ArchiveStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Append a recap, returning its archive id
    pub fn append(&self, stats: &SessionStats) -> Result<Uuid> {
        let id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO session_archive (id, started_at, ended_at, total_seconds, stats_json)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id.to_string(),
                stats.started_at.to_rfc3339(),
                stats.ended_at.to_rfc3339(),
                stats.total_duration_seconds as i64,
                serde_json::to_string(stats)?,
            ],
        )?;
        Ok(id)
    }

    /// Most recent sessions first
    pub fn list_recent(&self, limit: u32) -> Result<Vec<ArchivedSession>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, stats_json FROM session_archive
             ORDER BY ended_at DESC, rowid DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit], raw_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter().map(decode).collect()
    }

    pub fn find_by_id(&self, id: Uuid) -> Result<Option<ArchivedSession>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, stats_json FROM session_archive WHERE id = ?1",
                params![id.to_string()],
                raw_row,
            )
            .optional()?;

        row.map(decode).transpose()
    }

    pub fn count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM session_archive", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn raw_row(row: &Row<'_>) -> rusqlite::Result<(Uuid, String)> {
    let id: String = row.get(0)?;
    Ok((parse_uuid(&id)?, row.get(1)?))
}

fn decode((id, stats_json): (Uuid, String)) -> Result<ArchivedSession> {
    Ok(ArchivedSession {
        id,
        stats: serde_json::from_str(&stats_json)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;
    use chrono::{Duration, TimeZone, Utc};

    fn stats(minutes_after: i64, total: u64) -> SessionStats {
        let started_at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
            + Duration::minutes(minutes_after);
        SessionStats {
            started_at,
            ended_at: started_at + Duration::seconds(total as i64),
            total_duration_seconds: total,
            topic_stats: Vec::new(),
        }
    }

    #[test]
    fn test_append_and_find() {
        let db = Database::open_in_memory().unwrap();
        let store = ArchiveStore::new(&db.conn);
        let recap = stats(0, 600);

        let id = store.append(&recap).unwrap();
        let found = store.find_by_id(id).unwrap().unwrap();
        assert_eq!(found.stats, recap);
        assert!(store.find_by_id(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_list_recent_order() {
        let db = Database::open_in_memory().unwrap();
        let store = ArchiveStore::new(&db.conn);

        store.append(&stats(0, 60)).unwrap();
        store.append(&stats(120, 60)).unwrap();
        store.append(&stats(60, 60)).unwrap();

        let recent = store.list_recent(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert!(recent[0].stats.ended_at > recent[1].stats.ended_at);
        assert_eq!(store.count().unwrap(), 3);
    }
}
