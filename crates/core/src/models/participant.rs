//! Participant model - a member of the speaking roster

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A person on the roster who may hold the token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: Uuid,
    pub name: String,
    /// Cumulative speaking time across all topics (seconds)
    #[serde(default)]
    pub speaking_time_seconds: u64,
    /// Cumulative turns across all topics
    #[serde(default)]
    pub turn_count: u32,
    /// Has spoken on the active topic (cleared on topic switch)
    #[serde(default)]
    pub has_spoken: bool,
}

impl Participant {
    pub fn new(name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            speaking_time_seconds: 0,
            turn_count: 0,
            has_spoken: false,
        }
    }
}
