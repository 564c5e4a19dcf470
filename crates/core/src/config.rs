//! Engine configuration
//!
//! Loaded from a TOML file; every field has a default so a partial (or
//! absent) file is fine:
//!
//! ```toml
//! [session]
//! max_speaking_seconds = 90
//! pass_policy = "facilitator"   # or "automatic"
//! turn_start = "paused"         # or "auto_start"
//!
//! [timer]
//! tick_ms = 1000
//! flush_after_seconds = 5
//! flush_interval_ms = 3000
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::models::{PassPolicy, SessionSettings, TurnStart, DEFAULT_MAX_SPEAKING_SECONDS};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub timer: TimerConfig,
}

/// Defaults for a new session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_max_speaking_seconds")]
    pub max_speaking_seconds: u32,
    #[serde(default)]
    pub pass_policy: PassPolicy,
    #[serde(default)]
    pub turn_start: TurnStart,
}

impl SessionConfig {
    pub fn settings(&self) -> SessionSettings {
        SessionSettings {
            pass_policy: self.pass_policy,
            turn_start: self.turn_start,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_speaking_seconds: DEFAULT_MAX_SPEAKING_SECONDS,
            pass_policy: PassPolicy::default(),
            turn_start: TurnStart::default(),
        }
    }
}

/// Timer cadence and batching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Report once this many whole seconds have accrued
    #[serde(default = "default_flush_after_seconds")]
    pub flush_after_seconds: u32,
    /// Report at least this often while running
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
}

impl TimerConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            flush_after_seconds: default_flush_after_seconds(),
            flush_interval_ms: default_flush_interval_ms(),
        }
    }
}

fn default_max_speaking_seconds() -> u32 {
    DEFAULT_MAX_SPEAKING_SECONDS
}

fn default_tick_ms() -> u64 {
    1000
}

fn default_flush_after_seconds() -> u32 {
    5
}

fn default_flush_interval_ms() -> u64 {
    3000
}

impl EngineConfig {
    /// Load from a file. A missing file yields the defaults.
    #[instrument(skip(path), fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate TOML content
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.session.max_speaking_seconds == 0 {
            return Err(Error::Config("max_speaking_seconds must be at least 1".into()));
        }
        if self.timer.tick_ms == 0 {
            return Err(Error::Config("tick_ms must be at least 1".into()));
        }
        if self.timer.flush_after_seconds == 0 || self.timer.flush_interval_ms == 0 {
            return Err(Error::Config("timer flush thresholds must be non-zero".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = EngineConfig::from_toml("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.session.max_speaking_seconds, 90);
        assert_eq!(config.session.pass_policy, PassPolicy::Facilitator);
        assert_eq!(config.session.turn_start, TurnStart::Paused);
        assert_eq!(config.timer.flush_after_seconds, 5);
        assert_eq!(config.timer.flush_interval(), Duration::from_secs(3));
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[session]
max_speaking_seconds = 120
pass_policy = "automatic"
turn_start = "auto_start"

[timer]
tick_ms = 500
flush_after_seconds = 4
flush_interval_ms = 2000
"#;
        let config = EngineConfig::from_toml(toml).unwrap();
        assert_eq!(config.session.max_speaking_seconds, 120);
        assert_eq!(config.session.settings().pass_policy, PassPolicy::Automatic);
        assert_eq!(config.session.settings().turn_start, TurnStart::AutoStart);
        assert_eq!(config.timer.tick(), Duration::from_millis(500));
        assert_eq!(config.timer.flush_after_seconds, 4);
    }

    #[test]
    fn test_rejects_zero_budget() {
        let result = EngineConfig::from_toml("[session]\nmax_speaking_seconds = 0\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_unknown_policy() {
        let result = EngineConfig::from_toml("[session]\npass_policy = \"sometimes\"\n");
        assert!(matches!(result, Err(Error::ConfigParse(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("talkstick.toml");
        std::fs::write(&path, "[timer]\nflush_after_seconds = 3\n").unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.timer.flush_after_seconds, 3);
        assert_eq!(config.timer.tick_ms, 1000);
    }
}
