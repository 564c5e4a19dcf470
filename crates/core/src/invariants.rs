//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible session states during
//! development. These checks are compiled out in release builds.

use std::collections::HashSet;

use uuid::Uuid;

use crate::ledger::Ledger;
use crate::models::{LedgerEntry, Participant, TokenState, Topic};

/// Validate a single ledger entry
pub fn assert_entry_invariants(entry: &LedgerEntry) {
    // Time only accrues while a turn is held
    debug_assert!(
        !(entry.is_untouched() && entry.speaking_time_seconds > 0),
        "Ledger entry ({}, {}) has {}s speaking time but no turns or passes",
        entry.participant_id,
        entry.topic_id,
        entry.speaking_time_seconds
    );

    debug_assert!(
        !entry.has_spoken || entry.turn_count > 0,
        "Ledger entry ({}, {}) marked spoken with zero turns",
        entry.participant_id,
        entry.topic_id
    );

    debug_assert!(
        entry.has_passed == (entry.pass_count > 0),
        "Ledger entry ({}, {}) pass flag disagrees with pass count {}",
        entry.participant_id,
        entry.topic_id,
        entry.pass_count
    );
}

/// Validate that the ledger covers exactly roster x topics
pub fn assert_ledger_invariants(ledger: &Ledger, participants: &[Participant], topics: &[Topic]) {
    let participant_ids: Vec<Uuid> = participants.iter().map(|p| p.id).collect();
    let topic_ids: Vec<Uuid> = topics.iter().map(|t| t.id).collect();

    debug_assert!(
        ledger.matches_cross_product(&participant_ids, &topic_ids),
        "Ledger has {} entries, expected {} participants x {} topics",
        ledger.len(),
        participant_ids.len(),
        topic_ids.len()
    );
}

/// Validate that roster ids are unique and non-nil
pub fn assert_roster_invariants(participants: &[Participant]) {
    let mut seen = HashSet::new();
    for participant in participants {
        debug_assert!(
            participant.id != Uuid::nil(),
            "Participant '{}' has nil id",
            participant.name
        );
        debug_assert!(
            seen.insert(participant.id),
            "Participant {} appears twice in roster",
            participant.id
        );
    }
}

/// Validate the topic list against the current topic
pub fn assert_topic_invariants(topics: &[Topic], current_topic_id: Option<Uuid>) {
    for topic in topics {
        debug_assert!(
            !topic.title.trim().is_empty(),
            "Topic {} has empty title",
            topic.id
        );
        debug_assert!(
            topic.is_active == (Some(topic.id) == current_topic_id),
            "Topic {} active flag disagrees with current topic {:?}",
            topic.id,
            current_topic_id
        );
    }
}

/// Validate that token state only references live ids and stays in budget
pub fn assert_token_invariants(token: &TokenState, participants: &[Participant], topics: &[Topic]) {
    if let Some(holder) = token.current_holder {
        debug_assert!(
            participants.iter().any(|p| p.id == holder),
            "Token holder {} is not on the roster",
            holder
        );
    }

    if let Some(topic_id) = token.current_topic_id {
        debug_assert!(
            topics.iter().any(|t| t.id == topic_id),
            "Current topic {} does not exist",
            topic_id
        );
    }

    // A running turn keeps its remaining time when the budget shrinks
    let ceiling = token.max_speaking_seconds.max(token.turn_budget_seconds);
    debug_assert!(
        token.time_remaining_seconds <= ceiling,
        "Remaining time {}s exceeds budget {}s",
        token.time_remaining_seconds,
        ceiling
    );

    debug_assert!(
        !(token.is_running && token.current_holder.is_none()),
        "Timer running with no token holder"
    );

    if let Some(settled) = token.settled_epoch {
        debug_assert!(
            settled < token.epoch && token.current_holder.is_some(),
            "Settled epoch {} outlived its turn (epoch {})",
            settled,
            token.epoch
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_participant(name: &str) -> Participant {
        Participant::new(name.to_string())
    }

    #[test]
    fn test_valid_entry() {
        let mut entry = LedgerEntry::new(Uuid::new_v4(), Uuid::new_v4());
        assert_entry_invariants(&entry);

        entry.turn_count = 1;
        entry.speaking_time_seconds = 40;
        entry.has_spoken = true;
        assert_entry_invariants(&entry);
    }

    #[test]
    #[should_panic(expected = "no turns or passes")]
    fn test_time_without_turn() {
        let mut entry = LedgerEntry::new(Uuid::new_v4(), Uuid::new_v4());
        entry.speaking_time_seconds = 5;
        assert_entry_invariants(&entry);
    }

    #[test]
    fn test_valid_token() {
        let alice = make_participant("Alice");
        let topic = Topic::new("Budget".to_string());
        let mut token = TokenState::new(60);
        token.current_holder = Some(alice.id);
        token.current_topic_id = Some(topic.id);
        token.is_running = true;
        assert_token_invariants(&token, &[alice], &[topic]);
    }

    #[test]
    #[should_panic(expected = "not on the roster")]
    fn test_dangling_holder() {
        let mut token = TokenState::new(60);
        token.current_holder = Some(Uuid::new_v4());
        assert_token_invariants(&token, &[], &[]);
    }

    #[test]
    #[should_panic(expected = "appears twice")]
    fn test_duplicate_participant() {
        let alice = make_participant("Alice");
        assert_roster_invariants(&[alice.clone(), alice]);
    }

    #[test]
    fn test_ledger_cross_product() {
        let people = vec![make_participant("Alice"), make_participant("Bob")];
        let topic = Topic::new("Roadmap".to_string());
        let mut ledger = Ledger::new();
        let ids: Vec<Uuid> = people.iter().map(|p| p.id).collect();
        ledger.add_topic(topic.id, &ids);
        assert_ledger_invariants(&ledger, &people, &[topic]);
    }
}
