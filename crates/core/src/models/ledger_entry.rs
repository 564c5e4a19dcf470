//! Ledger entry - per (participant, topic) participation record

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Accounting record for one participant on one topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub participant_id: Uuid,
    pub topic_id: Uuid,
    /// Completed at least one turn on this topic
    pub has_spoken: bool,
    /// Declined the token at least once on this topic
    pub has_passed: bool,
    pub speaking_time_seconds: u64,
    /// Times the token landed here, including turns later passed on unspoken
    pub turn_count: u32,
    pub pass_count: u32,
}

impl LedgerEntry {
    /// A zeroed entry
    pub fn new(participant_id: Uuid, topic_id: Uuid) -> Self {
        Self {
            participant_id,
            topic_id,
            has_spoken: false,
            has_passed: false,
            speaking_time_seconds: 0,
            turn_count: 0,
            pass_count: 0,
        }
    }

    pub fn key(&self) -> (Uuid, Uuid) {
        (self.participant_id, self.topic_id)
    }

    /// True if nothing has been recorded yet
    pub fn is_untouched(&self) -> bool {
        self.turn_count == 0 && self.pass_count == 0
    }
}
