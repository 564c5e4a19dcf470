//! Token state machine
//!
//! `Session` owns the roster, topic list, token state and ledger. Every
//! mutation goes through one of its operations; invalid requests are silent
//! no-ops. The session is purely synchronous and knows nothing about the
//! timer task: elapsed time arrives through [`Session::apply_elapsed`].

mod op;
mod records;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::invariants::{
    assert_ledger_invariants, assert_roster_invariants, assert_token_invariants,
    assert_topic_invariants,
};
use crate::ledger::Ledger;
use crate::models::{
    PassPolicy, Participant, SessionSettings, SessionStats, TokenState, Topic, TurnStart,
};
use crate::stats;

pub use op::{reduce, SessionOp};
pub use records::SessionRecords;

/// The complete state of one facilitated session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    participants: Vec<Participant>,
    topics: Vec<Topic>,
    token: TokenState,
    ledger: Ledger,
    settings: SessionSettings,
    started_at: Option<DateTime<Utc>>,
    last_stats: Option<SessionStats>,
}

impl Session {
    pub fn new(max_speaking_seconds: u32, settings: SessionSettings) -> Self {
        Self {
            participants: Vec::new(),
            topics: Vec::new(),
            token: TokenState::new(max_speaking_seconds.max(1)),
            ledger: Ledger::new(),
            settings,
            started_at: None,
            last_stats: None,
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    pub fn token(&self) -> &TokenState {
        &self.token
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn settings(&self) -> SessionSettings {
        self.settings
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn last_stats(&self) -> Option<&SessionStats> {
        self.last_stats.as_ref()
    }

    pub fn participant(&self, id: Uuid) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    pub fn topic(&self, id: Uuid) -> Option<&Topic> {
        self.topics.iter().find(|t| t.id == id)
    }

    pub fn current_topic(&self) -> Option<&Topic> {
        self.token.current_topic_id.and_then(|id| self.topic(id))
    }

    /// Display name of the token holder
    pub fn holder_name(&self) -> Option<&str> {
        self.token
            .current_holder
            .and_then(|id| self.participant(id))
            .map(|p| p.name.as_str())
    }

    /// Next participant after `id` in roster order, wrapping around.
    ///
    /// None if `id` is not on the roster or is the only member.
    pub fn next_after(&self, id: Uuid) -> Option<Uuid> {
        let index = self.participants.iter().position(|p| p.id == id)?;
        let next = self.participants.get((index + 1) % self.participants.len())?;
        (next.id != id).then_some(next.id)
    }

    fn participant_ids(&self) -> Vec<Uuid> {
        self.participants.iter().map(|p| p.id).collect()
    }

    fn topic_ids(&self) -> Vec<Uuid> {
        self.topics.iter().map(|t| t.id).collect()
    }

    // ------------------------------------------------------------------
    // Roster and topics
    // ------------------------------------------------------------------

    /// Add a participant by name. Blank names are ignored.
    pub fn add_participant(&mut self, name: &str) -> Option<Uuid> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let participant = Participant::new(name.to_string());
        let id = participant.id;
        self.insert_participant(participant);
        Some(id)
    }

    /// Add a prebuilt participant; a duplicate id is ignored
    pub fn insert_participant(&mut self, participant: Participant) {
        if participant.name.trim().is_empty() || self.participant(participant.id).is_some() {
            return;
        }
        self.ledger.add_participant(participant.id, &self.topic_ids());
        debug!(participant_id = %participant.id, name = %participant.name, "Participant added");
        self.participants.push(participant);
        self.check_invariants();
    }

    /// Remove a participant, their ledger row, and their hold on the token
    pub fn remove_participant(&mut self, id: Uuid) {
        let Some(index) = self.participants.iter().position(|p| p.id == id) else {
            return;
        };

        if self.token.current_holder == Some(id) {
            self.release_token();
        }
        if self.token.previous_holder == Some(id) {
            self.token.previous_holder = None;
        }

        self.participants.remove(index);
        let dropped = self.ledger.drop_participant(id);
        debug!(participant_id = %id, dropped, "Participant removed");
        self.check_invariants();
    }

    /// Empty the roster and ledger, and release the token
    pub fn reset_participants(&mut self) {
        self.participants.clear();
        self.ledger.clear();
        self.release_token();
        self.check_invariants();
    }

    /// Add a topic. The first topic added becomes current.
    pub fn add_topic(&mut self, title: &str, description: Option<&str>) -> Option<Uuid> {
        let title = title.trim();
        if title.is_empty() {
            return None;
        }
        let mut topic = Topic::new(title.to_string());
        topic.description = clean_description(description);
        let id = topic.id;
        self.insert_topic(topic);
        Some(id)
    }

    /// Add a prebuilt topic; a duplicate id or blank title is ignored
    pub fn insert_topic(&mut self, mut topic: Topic) {
        if topic.title.trim().is_empty() || self.topic(topic.id).is_some() {
            return;
        }
        topic.is_active = false;
        let id = topic.id;
        self.ledger.add_topic(id, &self.participant_ids());
        self.topics.push(topic);
        debug!(topic_id = %id, "Topic added");

        if self.token.current_topic_id.is_none() {
            self.set_active_topic(id);
        }
        self.check_invariants();
    }

    /// Change a topic's title and description. A blank title is ignored.
    pub fn edit_topic(&mut self, id: Uuid, title: &str, description: Option<&str>) {
        let title = title.trim();
        if title.is_empty() {
            return;
        }
        if let Some(topic) = self.topics.iter_mut().find(|t| t.id == id) {
            topic.title = title.to_string();
            topic.description = clean_description(description);
        }
        self.check_invariants();
    }

    /// Remove a topic and its ledger column
    pub fn remove_topic(&mut self, id: Uuid) {
        let Some(index) = self.topics.iter().position(|t| t.id == id) else {
            return;
        };

        if self.token.current_topic_id == Some(id) {
            self.token.current_topic_id = None;
            self.rebase_turn_clock();
        }
        self.topics.remove(index);
        let dropped = self.ledger.drop_topic(id);
        debug!(topic_id = %id, dropped, "Topic removed");
        self.check_invariants();
    }

    /// Clear roster, topics, ledger and token
    pub fn reset_all(&mut self) {
        self.topics.clear();
        self.token.current_topic_id = None;
        self.reset_participants();
    }

    /// Switch the discussion to another topic.
    ///
    /// Clears every participant's spoken flag and the direction hint. A
    /// current holder keeps the token: their seconds so far stay with the old
    /// topic and they start a turn on the new one.
    pub fn set_active_topic(&mut self, id: Uuid) {
        if self.topic(id).is_none() || self.token.current_topic_id == Some(id) {
            return;
        }

        if let Some(holder) = self.token.current_holder {
            if let Some(old_topic) = self.token.current_topic_id {
                let unaccrued = self.token.unaccrued_seconds();
                self.credit_speaking_time(holder, old_topic, unaccrued);
            }
        }

        self.token.current_topic_id = Some(id);
        self.token.previous_holder = None;
        self.rebase_turn_clock();
        for topic in &mut self.topics {
            topic.is_active = topic.id == id;
        }
        for participant in &mut self.participants {
            participant.has_spoken = false;
        }

        if let Some(holder) = self.token.current_holder {
            self.grant_turn(holder, id);
        }
        debug!(topic_id = %id, "Active topic changed");
        self.check_invariants();
    }

    // ------------------------------------------------------------------
    // Token transitions
    // ------------------------------------------------------------------

    /// Hand the token to `id`, completing the outgoing holder's turn.
    ///
    /// Passing to the current holder or to someone not on the roster is
    /// ignored.
    pub fn pass_token_to(&mut self, id: Uuid) {
        if self.token.current_holder == Some(id) || self.participant(id).is_none() {
            return;
        }

        if let (Some(outgoing), Some(topic)) =
            (self.token.current_holder, self.token.current_topic_id)
        {
            let unaccrued = self.token.unaccrued_seconds();
            self.ledger.complete_turn(outgoing, topic, unaccrued);
            if let Some(p) = self.participant_mut(outgoing) {
                p.has_spoken = true;
                p.speaking_time_seconds += u64::from(unaccrued);
            }
        }

        self.hand_over(id);
    }

    /// The holder declines to speak; the token moves to the next person.
    ///
    /// Requires a holder and an active topic. With a single participant
    /// there is nobody to move to, so nothing happens.
    pub fn pass_without_speaking(&mut self) {
        let (Some(holder), Some(topic)) = (self.token.current_holder, self.token.current_topic_id)
        else {
            return;
        };
        let Some(next) = self.next_after(holder) else {
            return;
        };

        self.ledger.record_pass(holder, topic);
        self.hand_over(next);
    }

    /// Remaining time hit zero
    pub fn on_time_expired(&mut self) {
        if let Some(holder) = self.token.current_holder {
            if self.settings.pass_policy == PassPolicy::Automatic && self.participants.len() > 1 {
                if let Some(next) = self.next_after(holder) {
                    debug!(from = %holder, to = %next, "Time expired, passing automatically");
                    self.pass_token_to(next);
                    return;
                }
            }
        }

        debug!("Time expired, waiting for facilitator");
        self.token.is_running = false;
        self.check_invariants();
    }

    /// Apply elapsed seconds reported by the timer for turn `epoch`.
    ///
    /// Updates from an older epoch are dropped. Returns the seconds applied.
    pub fn apply_elapsed(&mut self, epoch: u64, seconds: u32) -> u32 {
        if epoch != self.token.epoch {
            if self.token.settled_epoch == Some(epoch) {
                return self.credit_late_flush(seconds);
            }
            debug!(epoch, current = self.token.epoch, seconds, "Dropping stale timer update");
            return 0;
        }
        let Some(holder) = self.token.current_holder else {
            return 0;
        };

        let delta = seconds.min(self.token.time_remaining_seconds);
        self.token.time_remaining_seconds -= delta;
        self.token.turn_accrued_seconds += delta;
        if let Some(topic) = self.token.current_topic_id {
            self.credit_speaking_time(holder, topic, delta);
        }

        if self.token.time_remaining_seconds == 0 && self.token.is_running {
            self.on_time_expired();
        } else {
            self.check_invariants();
        }
        delta
    }

    // ------------------------------------------------------------------
    // Timer controls and settings
    // ------------------------------------------------------------------

    /// Start the countdown. Needs a holder and time left.
    pub fn start(&mut self) {
        if self.token.is_idle() || self.token.time_remaining_seconds == 0 {
            return;
        }
        self.token.is_running = true;
        self.check_invariants();
    }

    pub fn pause(&mut self) {
        self.token.is_running = false;
    }

    /// Stop the countdown and refill the turn budget
    pub fn reset(&mut self) {
        self.token.is_running = false;
        self.token.restart_turn_clock();
        self.check_invariants();
    }

    /// Change the per-turn budget.
    ///
    /// A paused turn picks up the new budget at once; a running one keeps its
    /// remaining time until the next turn starts. Zero is ignored.
    pub fn set_max_speaking_seconds(&mut self, value: u32) {
        if value == 0 {
            return;
        }
        self.token.max_speaking_seconds = value;
        if !self.token.is_running {
            if let (Some(holder), Some(topic)) =
                (self.token.current_holder, self.token.current_topic_id)
            {
                let unaccrued = self.token.unaccrued_seconds();
                self.credit_speaking_time(holder, topic, unaccrued);
            }
            self.token.rebudget_paused_turn(value);
        }
        self.check_invariants();
    }

    pub fn set_pass_policy(&mut self, policy: PassPolicy) {
        self.settings.pass_policy = policy;
    }

    pub fn set_turn_start(&mut self, turn_start: TurnStart) {
        self.settings.turn_start = turn_start;
    }

    // ------------------------------------------------------------------
    // Session lifecycle
    // ------------------------------------------------------------------

    /// Stamp the session start, unless already started
    pub fn start_session(&mut self, at: DateTime<Utc>) {
        if self.started_at.is_none() {
            self.started_at = Some(at);
        }
    }

    /// Produce the recap, keep it as `last_stats`, and stop the clock.
    ///
    /// A session that was never started is treated as starting at `at`.
    pub fn end_session(&mut self, at: DateTime<Utc>) -> SessionStats {
        let started_at = self.started_at.unwrap_or(at);
        let recap = stats::aggregate(started_at, at, &self.participants, &self.topics, &self.ledger);
        self.token.is_running = false;
        self.started_at = None;
        self.last_stats = Some(recap.clone());
        recap
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn participant_mut(&mut self, id: Uuid) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.id == id)
    }

    /// Atomic replace of holder plus a fresh turn clock
    fn hand_over(&mut self, incoming: Uuid) {
        self.token.previous_holder = self.token.current_holder;
        self.token.current_holder = Some(incoming);
        self.token.restart_turn_clock();
        self.token.is_running = self.settings.turn_start == TurnStart::AutoStart;

        if let Some(topic) = self.token.current_topic_id {
            self.grant_turn(incoming, topic);
        }
        debug!(
            holder = %incoming,
            previous = ?self.token.previous_holder,
            epoch = self.token.epoch,
            running = self.token.is_running,
            "Token passed"
        );
        self.check_invariants();
    }

    fn grant_turn(&mut self, participant_id: Uuid, topic_id: Uuid) {
        self.ledger.grant_turn(participant_id, topic_id);
        if let Some(p) = self.participant_mut(participant_id) {
            p.turn_count += 1;
        }
    }

    fn credit_speaking_time(&mut self, participant_id: Uuid, topic_id: Uuid, seconds: u32) {
        if seconds == 0 {
            return;
        }
        self.ledger.accrue_speaking_time(participant_id, topic_id, seconds);
        if let Some(p) = self.participant_mut(participant_id) {
            p.speaking_time_seconds += u64::from(seconds);
        }
    }

    /// Back to Idle; stale timer updates for the old turn are dropped
    fn release_token(&mut self) {
        self.token.current_holder = None;
        self.token.previous_holder = None;
        self.token.is_running = false;
        self.token.restart_turn_clock();
    }

    /// Count the rest of the current turn from here on
    /// Seconds flushed for the turn's settled epoch: ledger only
    fn credit_late_flush(&mut self, seconds: u32) -> u32 {
        let (Some(holder), Some(topic)) = (self.token.current_holder, self.token.current_topic_id)
        else {
            return 0;
        };
        debug!(holder = %holder, seconds, "Crediting late flush from before the budget change");
        self.credit_speaking_time(holder, topic, seconds);
        self.check_invariants();
        seconds
    }

    fn rebase_turn_clock(&mut self) {
        self.token.turn_budget_seconds = self.token.time_remaining_seconds;
        self.token.turn_accrued_seconds = 0;
    }

    fn check_invariants(&self) {
        assert_roster_invariants(&self.participants);
        assert_topic_invariants(&self.topics, self.token.current_topic_id);
        assert_token_invariants(&self.token, &self.participants, &self.topics);
        assert_ledger_invariants(&self.ledger, &self.participants, &self.topics);
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(crate::models::DEFAULT_MAX_SPEAKING_SECONDS, SessionSettings::default())
    }
}

fn clean_description(description: Option<&str>) -> Option<String> {
    description
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
}
