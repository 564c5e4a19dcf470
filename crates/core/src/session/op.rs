//! Session operations as data
//!
//! Every mutation the presentation layer can request, in one enum, so a
//! session can be driven (and tested) as a plain (state, op) -> state fold.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::Session;
use crate::models::{PassPolicy, Participant, Topic, TurnStart};

/// A single requested mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOp {
    AddParticipant(Participant),
    RemoveParticipant(Uuid),
    ResetParticipants,
    AddTopic(Topic),
    EditTopic {
        id: Uuid,
        title: String,
        description: Option<String>,
    },
    RemoveTopic(Uuid),
    SetActiveTopic(Uuid),
    PassTokenTo(Uuid),
    PassWithoutSpeaking,
    TimeExpired,
    /// Seconds reported by the timer for a given turn epoch
    Elapsed { epoch: u64, seconds: u32 },
    Start,
    Pause,
    Reset,
    SetMaxSpeakingSeconds(u32),
    SetPassPolicy(PassPolicy),
    SetTurnStart(TurnStart),
    StartSession(DateTime<Utc>),
    EndSession(DateTime<Utc>),
    ResetAll,
}

impl Session {
    /// Apply one operation in place
    pub fn apply(&mut self, op: SessionOp) {
        match op {
            SessionOp::AddParticipant(participant) => self.insert_participant(participant),
            SessionOp::RemoveParticipant(id) => self.remove_participant(id),
            SessionOp::ResetParticipants => self.reset_participants(),
            SessionOp::AddTopic(topic) => self.insert_topic(topic),
            SessionOp::EditTopic {
                id,
                title,
                description,
            } => self.edit_topic(id, &title, description.as_deref()),
            SessionOp::RemoveTopic(id) => self.remove_topic(id),
            SessionOp::SetActiveTopic(id) => self.set_active_topic(id),
            SessionOp::PassTokenTo(id) => self.pass_token_to(id),
            SessionOp::PassWithoutSpeaking => self.pass_without_speaking(),
            SessionOp::TimeExpired => self.on_time_expired(),
            SessionOp::Elapsed { epoch, seconds } => {
                self.apply_elapsed(epoch, seconds);
            }
            SessionOp::Start => self.start(),
            SessionOp::Pause => self.pause(),
            SessionOp::Reset => self.reset(),
            SessionOp::SetMaxSpeakingSeconds(value) => self.set_max_speaking_seconds(value),
            SessionOp::SetPassPolicy(policy) => self.set_pass_policy(policy),
            SessionOp::SetTurnStart(turn_start) => self.set_turn_start(turn_start),
            SessionOp::StartSession(at) => self.start_session(at),
            SessionOp::EndSession(at) => {
                self.end_session(at);
            }
            SessionOp::ResetAll => self.reset_all(),
        }
    }
}

/// Pure transition: the state after applying `op` to `state`
pub fn reduce(state: &Session, op: SessionOp) -> Session {
    let mut next = state.clone();
    next.apply(op);
    next
}
