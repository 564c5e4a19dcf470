//! Token state and the facilitator policies that shape transitions

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default per-turn speaking budget (seconds)
pub const DEFAULT_MAX_SPEAKING_SECONDS: u32 = 90;

/// What happens when a speaker's time runs out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PassPolicy {
    /// Token moves to the next participant in roster order
    Automatic,
    /// Timer stops; the facilitator passes explicitly
    #[default]
    Facilitator,
}

impl PassPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "automatic" | "auto" => Some(Self::Automatic),
            "facilitator" | "manual" => Some(Self::Facilitator),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Automatic => "automatic",
            Self::Facilitator => "facilitator",
        }
    }
}

/// Whether a freshly granted turn starts its timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TurnStart {
    /// Timer begins counting as soon as the token lands
    AutoStart,
    /// Timer waits for an explicit start
    #[default]
    Paused,
}

impl TurnStart {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "auto_start" | "auto-start" | "auto" => Some(Self::AutoStart),
            "paused" | "pause" => Some(Self::Paused),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AutoStart => "auto_start",
            Self::Paused => "paused",
        }
    }
}

/// Facilitator-controlled settings, persisted alongside session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SessionSettings {
    #[serde(default)]
    pub pass_policy: PassPolicy,
    #[serde(default)]
    pub turn_start: TurnStart,
}

/// Who holds the token, on which topic, and how much time is left
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenState {
    pub current_holder: Option<Uuid>,
    /// Direction hint only; never used for transitions
    pub previous_holder: Option<Uuid>,
    pub time_remaining_seconds: u32,
    pub is_running: bool,
    pub max_speaking_seconds: u32,
    pub current_topic_id: Option<Uuid>,
    /// Turn generation; timer updates tagged with an older epoch are dropped
    #[serde(default)]
    pub epoch: u64,
    /// Remaining time the current turn began with
    #[serde(default)]
    pub turn_budget_seconds: u32,
    /// Seconds of the current turn already accrued into the ledger
    #[serde(default)]
    pub turn_accrued_seconds: u32,
    /// Earlier epoch of this same turn, left behind when a paused turn was
    /// given a new budget. Its late flushes still count as speaking time but
    /// no longer move the clock.
    #[serde(default)]
    pub settled_epoch: Option<u64>,
}

impl TokenState {
    pub fn new(max_speaking_seconds: u32) -> Self {
        Self {
            current_holder: None,
            previous_holder: None,
            time_remaining_seconds: max_speaking_seconds,
            is_running: false,
            max_speaking_seconds,
            current_topic_id: None,
            epoch: 0,
            turn_budget_seconds: max_speaking_seconds,
            turn_accrued_seconds: 0,
            settled_epoch: None,
        }
    }

    /// Idle: nobody holds the token
    pub fn is_idle(&self) -> bool {
        self.current_holder.is_none()
    }

    /// Seconds spoken this turn that have not reached the ledger yet
    pub fn unaccrued_seconds(&self) -> u32 {
        self.turn_budget_seconds
            .saturating_sub(self.time_remaining_seconds)
            .saturating_sub(self.turn_accrued_seconds)
    }

    /// Start a fresh turn clock at the full budget
    pub(crate) fn restart_turn_clock(&mut self) {
        self.time_remaining_seconds = self.max_speaking_seconds;
        self.turn_budget_seconds = self.max_speaking_seconds;
        self.turn_accrued_seconds = 0;
        self.settled_epoch = None;
        self.epoch += 1;
    }

    /// Refill a paused turn with `budget` under a new epoch.
    ///
    /// The holder keeps the token; flushes still in flight for the old epoch
    /// are routed to the ledger only.
    pub(crate) fn rebudget_paused_turn(&mut self, budget: u32) {
        self.settled_epoch = self.current_holder.map(|_| self.epoch);
        self.time_remaining_seconds = budget;
        self.turn_budget_seconds = budget;
        self.turn_accrued_seconds = 0;
        self.epoch += 1;
    }
}

impl Default for TokenState {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SPEAKING_SECONDS)
    }
}
