//! Application state management

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use talkstick_core::{
    ArchiveRepository, ArchivedSession, Database, EngineConfig, Error, RecordRepository, Result,
    Session, SessionStats,
};
use tracing::info;

const DATABASE_FILE: &str = "talkstick.db";
const CONFIG_FILE: &str = "talkstick.toml";

/// Main application state
pub struct AppState {
    db: Database,
    config: EngineConfig,
    data_dir: PathBuf,
}

impl AppState {
    /// Open state in the platform data directory.
    ///
    /// `config_path` overrides the default `talkstick.toml` location.
    pub fn new(config_path: Option<PathBuf>) -> Result<Self> {
        let data_dir = Self::data_path()?;
        let config_path = config_path.unwrap_or_else(|| data_dir.join(CONFIG_FILE));
        Self::open_at(data_dir, &config_path)
    }

    /// Open state rooted at an explicit directory
    pub fn open_at(data_dir: PathBuf, config_path: &Path) -> Result<Self> {
        std::fs::create_dir_all(&data_dir)?;

        let config = EngineConfig::load(config_path)?;
        let db = Database::open(data_dir.join(DATABASE_FILE))?;
        info!(data_dir = %data_dir.display(), "Application state ready");

        Ok(Self {
            db,
            config,
            data_dir,
        })
    }

    fn data_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "talkstick", "talkstick").ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not determine data directory",
            ))
        })?;

        Ok(dirs.data_dir().to_path_buf())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Rebuild the last saved session, with configured defaults filling gaps
    pub fn restore_session(&self) -> Result<Session> {
        let records = self.db.load_records()?;
        Ok(Session::from_records(
            records,
            self.config.session.max_speaking_seconds,
            self.config.session.settings(),
        ))
    }

    pub fn persist(&self, session: &Session) -> Result<()> {
        self.db.save_records(&session.to_records())
    }

    pub fn archive(&self, stats: &SessionStats) -> Result<()> {
        let id = self.db.archive_session(stats)?;
        info!(archive_id = %id, "Session archived");
        Ok(())
    }

    pub fn history(&self, limit: u32) -> Result<Vec<ArchivedSession>> {
        self.db.recent_sessions(limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_fresh_state_uses_config_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE);
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "[session]\nmax_speaking_seconds = 45").unwrap();

        let state = AppState::open_at(dir.path().join("data"), &config_path).unwrap();
        let session = state.restore_session().unwrap();
        assert_eq!(session.token().max_speaking_seconds, 45);
        assert!(session.participants().is_empty());
    }

    #[test]
    fn test_persist_and_restore() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE);

        {
            let state = AppState::open_at(dir.path().to_path_buf(), &config_path).unwrap();
            let mut session = state.restore_session().unwrap();
            session.add_participant("Alice");
            session.add_topic("Retro", None);
            state.persist(&session).unwrap();
        }

        let state = AppState::open_at(dir.path().to_path_buf(), &config_path).unwrap();
        let session = state.restore_session().unwrap();
        assert_eq!(session.participants()[0].name, "Alice");
        assert_eq!(session.current_topic().map(|t| t.title.as_str()), Some("Retro"));
        assert_eq!(session.ledger().len(), 1);
    }
}
