//! Talkstick Core Library
//!
//! Talking-token session engine: roster, topics, token state machine,
//! participation ledger, speaking timer, recap statistics and storage.

pub mod config;
pub mod engine;
pub mod error;
pub mod invariants;
pub mod ledger;
pub mod models;
pub mod session;
pub mod stats;
pub mod storage;
pub mod timer;

pub use config::{EngineConfig, SessionConfig, TimerConfig};
pub use engine::Engine;
pub use error::{Error, Result};
pub use ledger::Ledger;
pub use models::*;
pub use session::{reduce, Session, SessionOp, SessionRecords};
pub use storage::{
    ArchiveRepository, ArchivedSession, Database, RecordRepository, Storage,
};
pub use timer::{ElapsedUpdate, TimerService};
