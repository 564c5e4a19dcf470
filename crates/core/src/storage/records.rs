//! Keyed JSON records for the live session

use chrono::Utc;
use rusqlite::{params, Connection};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;
use crate::storage::parse::OptionalExt;

pub const ROSTER: &str = "roster";
pub const TOPICS: &str = "topics";
pub const TOKEN: &str = "token";
pub const LEDGER: &str = "ledger";
pub const SETTINGS: &str = "settings";
pub const LAST_STATS: &str = "last_stats";
pub const STARTED_AT: &str = "session_started_at";

/// Record store over `session_records`
pub struct RecordStore<'a> {
    conn: &'a Connection,
}

impl<'a> RecordStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert or replace the record under `key`
    pub fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let payload = serde_json::to_string(value)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO session_records (key, payload, updated_at)
             VALUES (?1, ?2, ?3)",
            params![key, payload, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Load the record under `key`.
    ///
    /// A missing row is `Ok(None)`; a payload that no longer parses is an
    /// [`Error::Serialization`](crate::Error::Serialization).
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload FROM session_records WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        match payload {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    pub fn delete(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM session_records WHERE key = ?1", params![key])?;
        Ok(())
    }

    /// Keys currently stored, sorted
    pub fn keys(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key FROM session_records ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Participant;
    use crate::storage::Database;
    use crate::Error;

    #[test]
    fn test_save_and_load() {
        let db = Database::open_in_memory().unwrap();
        let store = RecordStore::new(&db.conn);
        let roster = vec![
            Participant::new("Alice".to_string()),
            Participant::new("Bob".to_string()),
        ];

        store.save(ROSTER, &roster).unwrap();
        let loaded: Vec<Participant> = store.load(ROSTER).unwrap().unwrap();
        assert_eq!(loaded, roster);
    }

    #[test]
    fn test_save_replaces() {
        let db = Database::open_in_memory().unwrap();
        let store = RecordStore::new(&db.conn);

        store.save(TOKEN, &1u32).unwrap();
        store.save(TOKEN, &2u32).unwrap();

        assert_eq!(store.load::<u32>(TOKEN).unwrap(), Some(2));
        assert_eq!(store.keys().unwrap(), vec![TOKEN.to_string()]);
    }

    #[test]
    fn test_missing_record() {
        let db = Database::open_in_memory().unwrap();
        let store = RecordStore::new(&db.conn);

        assert!(store.load::<Vec<Participant>>(ROSTER).unwrap().is_none());
    }

    #[test]
    fn test_malformed_record() {
        let db = Database::open_in_memory().unwrap();
        db.conn
            .execute(
                "INSERT INTO session_records (key, payload, updated_at) VALUES (?1, ?2, ?3)",
                params![ROSTER, "{not json", Utc::now().to_rfc3339()],
            )
            .unwrap();

        let result = RecordStore::new(&db.conn).load::<Vec<Participant>>(ROSTER);
        assert!(matches!(result, Err(Error::Serialization(_))));
    }

    #[test]
    fn test_delete() {
        let db = Database::open_in_memory().unwrap();
        let store = RecordStore::new(&db.conn);

        store.save(LAST_STATS, &Option::<u32>::None).unwrap();
        store.delete(LAST_STATS).unwrap();
        assert!(store.keys().unwrap().is_empty());
    }
}
