//! Plain serializable records for persisting a session

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::Session;
use crate::ledger::Ledger;
use crate::models::{
    LedgerEntry, Participant, SessionSettings, SessionStats, TokenState, Topic,
};

/// Everything a session needs to survive a restart.
///
/// Each field is stored and loaded independently; a missing or malformed
/// record falls back to its default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecords {
    pub roster: Vec<Participant>,
    pub topics: Vec<Topic>,
    pub token: Option<TokenState>,
    pub ledger: Vec<LedgerEntry>,
    pub settings: Option<SessionSettings>,
    pub last_stats: Option<SessionStats>,
    pub started_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Snapshot the session as storable records
    pub fn to_records(&self) -> SessionRecords {
        SessionRecords {
            roster: self.participants.clone(),
            topics: self.topics.clone(),
            token: Some(self.token.clone()),
            ledger: self.ledger.to_entries(),
            settings: Some(self.settings),
            last_stats: self.last_stats.clone(),
            started_at: self.started_at,
        }
    }

    /// Rebuild a session from stored records, repairing anything inconsistent.
    ///
    /// `max_speaking_seconds` and `settings` are the configured defaults,
    /// used when the token or settings record is absent. A restored timer is
    /// never running.
    pub fn from_records(
        records: SessionRecords,
        max_speaking_seconds: u32,
        settings: SessionSettings,
    ) -> Self {
        let mut participants: Vec<Participant> = Vec::with_capacity(records.roster.len());
        for participant in records.roster {
            if participant.name.trim().is_empty() || participants.iter().any(|p| p.id == participant.id) {
                warn!(participant_id = %participant.id, "Skipping invalid stored participant");
                continue;
            }
            participants.push(participant);
        }

        let mut topics: Vec<Topic> = Vec::with_capacity(records.topics.len());
        for topic in records.topics {
            if topic.title.trim().is_empty() || topics.iter().any(|t| t.id == topic.id) {
                warn!(topic_id = %topic.id, "Skipping invalid stored topic");
                continue;
            }
            topics.push(topic);
        }

        let mut token = records
            .token
            .unwrap_or_else(|| TokenState::new(max_speaking_seconds.max(1)));
        token.is_running = false;
        token.settled_epoch = None;
        if token.max_speaking_seconds == 0 {
            token.max_speaking_seconds = max_speaking_seconds.max(1);
        }
        if token
            .current_holder
            .is_some_and(|id| !participants.iter().any(|p| p.id == id))
        {
            token.current_holder = None;
        }
        if token
            .previous_holder
            .is_some_and(|id| !participants.iter().any(|p| p.id == id))
        {
            token.previous_holder = None;
        }
        if token
            .current_topic_id
            .is_some_and(|id| !topics.iter().any(|t| t.id == id))
        {
            token.current_topic_id = None;
        }
        let ceiling = token.max_speaking_seconds.max(token.turn_budget_seconds);
        token.time_remaining_seconds = token.time_remaining_seconds.min(ceiling);
        token.turn_budget_seconds = token.turn_budget_seconds.max(token.time_remaining_seconds);
        for topic in &mut topics {
            topic.is_active = Some(topic.id) == token.current_topic_id;
        }

        let mut ledger = Ledger::from_entries(records.ledger);
        let participant_ids: Vec<_> = participants.iter().map(|p| p.id).collect();
        let topic_ids: Vec<_> = topics.iter().map(|t| t.id).collect();
        let (dropped, filled) = ledger.reconcile(&participant_ids, &topic_ids);
        if dropped > 0 || filled > 0 {
            info!(dropped, filled, "Repaired stored ledger");
        }

        let session = Self {
            participants,
            topics,
            token,
            ledger,
            settings: records.settings.unwrap_or(settings),
            started_at: records.started_at,
            last_stats: records.last_stats,
        };
        session.check_invariants();
        session
    }
}
