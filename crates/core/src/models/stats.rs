//! End-of-session statistics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Immutable recap of a finished session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// Wall-clock session length, not the sum of speaking time
    pub total_duration_seconds: u64,
    pub topic_stats: Vec<TopicStats>,
}

/// Rollup for one topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicStats {
    pub topic_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    /// Sum of participant speaking time on this topic
    pub total_speaking_seconds: u64,
    /// Share of the whole session, rounded
    pub session_share_percent: u32,
    pub participant_stats: Vec<ParticipantTopicStats>,
}

/// One participant's line in a topic rollup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantTopicStats {
    pub participant_id: Uuid,
    pub name: String,
    pub speaking_time_seconds: u64,
    pub turn_count: u32,
    pub pass_count: u32,
    /// Share of the topic's speaking time, rounded
    pub share_percent: u32,
}
