//! Participation ledger
//!
//! One entry per (participant, topic) pair. The session keeps the key set
//! equal to the full cross-product of roster and topic list; every counter
//! only ever grows.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::invariants::assert_entry_invariants;
use crate::models::LedgerEntry;

/// Per-(participant, topic) accounting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<LedgerEntry>", into = "Vec<LedgerEntry>")]
pub struct Ledger {
    entries: HashMap<(Uuid, Uuid), LedgerEntry>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from stored entries; a duplicate key keeps the last entry seen
    pub fn from_entries(entries: Vec<LedgerEntry>) -> Self {
        let entries = entries.into_iter().map(|e| (e.key(), e)).collect();
        Self { entries }
    }

    pub fn get(&self, participant_id: Uuid, topic_id: Uuid) -> Option<&LedgerEntry> {
        self.entries.get(&(participant_id, topic_id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, participant_id: Uuid, topic_id: Uuid) -> bool {
        self.entries.contains_key(&(participant_id, topic_id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.values()
    }

    /// Entries for one topic, in no particular order
    pub fn for_topic(&self, topic_id: Uuid) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.values().filter(move |e| e.topic_id == topic_id)
    }

    /// All entries sorted by key, for stable serialization
    pub fn to_entries(&self) -> Vec<LedgerEntry> {
        let mut entries: Vec<LedgerEntry> = self.entries.values().cloned().collect();
        entries.sort_by_key(|e| e.key());
        entries
    }

    /// Extend the ledger with a zeroed row for a new participant
    pub fn add_participant(&mut self, participant_id: Uuid, topic_ids: &[Uuid]) {
        for topic_id in topic_ids {
            self.entries
                .entry((participant_id, *topic_id))
                .or_insert_with(|| LedgerEntry::new(participant_id, *topic_id));
        }
    }

    /// Extend the ledger with a zeroed column for a new topic
    pub fn add_topic(&mut self, topic_id: Uuid, participant_ids: &[Uuid]) {
        for participant_id in participant_ids {
            self.entries
                .entry((*participant_id, topic_id))
                .or_insert_with(|| LedgerEntry::new(*participant_id, topic_id));
        }
    }

    /// Remove every entry for a participant. Returns how many were removed.
    pub fn drop_participant(&mut self, participant_id: Uuid) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(p, _), _| *p != participant_id);
        before - self.entries.len()
    }

    /// Remove every entry for a topic. Returns how many were removed.
    pub fn drop_topic(&mut self, topic_id: Uuid) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(_, t), _| *t != topic_id);
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Force the key set to exactly `participant_ids` x `topic_ids`.
    ///
    /// Returns (orphans dropped, gaps filled).
    pub fn reconcile(&mut self, participant_ids: &[Uuid], topic_ids: &[Uuid]) -> (usize, usize) {
        let before = self.entries.len();
        self.entries
            .retain(|(p, t), _| participant_ids.contains(p) && topic_ids.contains(t));
        let dropped = before - self.entries.len();

        let kept = self.entries.len();
        for participant_id in participant_ids {
            self.add_participant(*participant_id, topic_ids);
        }
        let filled = self.entries.len() - kept;

        (dropped, filled)
    }

    /// True if the key set is exactly the cross-product
    pub fn matches_cross_product(&self, participant_ids: &[Uuid], topic_ids: &[Uuid]) -> bool {
        self.entries.len() == participant_ids.len() * topic_ids.len()
            && participant_ids
                .iter()
                .all(|p| topic_ids.iter().all(|t| self.contains(*p, *t)))
    }

    /// A full turn: counted, marked as spoken, and its speaking time added
    pub fn record_turn(&mut self, participant_id: Uuid, topic_id: Uuid, elapsed_seconds: u32) {
        let entry = self.entry_mut(participant_id, topic_id);
        entry.turn_count += 1;
        entry.has_spoken = true;
        entry.speaking_time_seconds += u64::from(elapsed_seconds);
        assert_entry_invariants(entry);
    }

    /// The token landed on this participant for this topic.
    ///
    /// The turn counts on receipt, before anyone knows whether the holder
    /// will speak. A holder who then passes ends with one turn and one pass
    /// but `has_spoken == false`; `pass_count` and `has_spoken` tell the two
    /// outcomes apart.
    pub fn grant_turn(&mut self, participant_id: Uuid, topic_id: Uuid) {
        let entry = self.entry_mut(participant_id, topic_id);
        entry.turn_count += 1;
        assert_entry_invariants(entry);
    }

    /// The holder finished speaking and handed the token on
    pub fn complete_turn(&mut self, participant_id: Uuid, topic_id: Uuid, elapsed_seconds: u32) {
        let entry = self.entry_mut(participant_id, topic_id);
        if entry.turn_count == 0 {
            entry.turn_count = 1;
        }
        entry.has_spoken = true;
        entry.speaking_time_seconds += u64::from(elapsed_seconds);
        assert_entry_invariants(entry);
    }

    /// The holder declined to speak
    pub fn record_pass(&mut self, participant_id: Uuid, topic_id: Uuid) {
        let entry = self.entry_mut(participant_id, topic_id);
        entry.pass_count += 1;
        entry.has_passed = true;
        assert_entry_invariants(entry);
    }

    /// Live speaking time from the timer, ahead of the turn ending.
    ///
    /// Time can only accrue during a turn, so an entry with nothing recorded
    /// yet is counted as holding one.
    pub fn accrue_speaking_time(&mut self, participant_id: Uuid, topic_id: Uuid, delta_seconds: u32) {
        if delta_seconds == 0 {
            return;
        }
        let entry = self.entry_mut(participant_id, topic_id);
        if entry.is_untouched() {
            entry.turn_count = 1;
        }
        entry.speaking_time_seconds += u64::from(delta_seconds);
        assert_entry_invariants(entry);
    }

    fn entry_mut(&mut self, participant_id: Uuid, topic_id: Uuid) -> &mut LedgerEntry {
        self.entries
            .entry((participant_id, topic_id))
            .or_insert_with(|| {
                debug!(%participant_id, %topic_id, "Creating missing ledger entry");
                LedgerEntry::new(participant_id, topic_id)
            })
    }
}

impl From<Vec<LedgerEntry>> for Ledger {
    fn from(entries: Vec<LedgerEntry>) -> Self {
        Self::from_entries(entries)
    }
}

impl From<Ledger> for Vec<LedgerEntry> {
    fn from(ledger: Ledger) -> Self {
        ledger.to_entries()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    #[test]
    fn test_cross_product_grows_both_ways() {
        let mut ledger = Ledger::new();
        let people = ids(3);
        let topic_a = Uuid::new_v4();
        let topic_b = Uuid::new_v4();

        ledger.add_topic(topic_a, &people);
        assert!(ledger.matches_cross_product(&people, &[topic_a]));

        ledger.add_topic(topic_b, &people);
        let newcomer = Uuid::new_v4();
        ledger.add_participant(newcomer, &[topic_a, topic_b]);

        let mut everyone = people.clone();
        everyone.push(newcomer);
        assert_eq!(ledger.len(), 8);
        assert!(ledger.matches_cross_product(&everyone, &[topic_a, topic_b]));
    }

    #[test]
    fn test_drop_leaves_no_orphans() {
        let mut ledger = Ledger::new();
        let people = ids(2);
        let topics = ids(2);
        for t in &topics {
            ledger.add_topic(*t, &people);
        }

        assert_eq!(ledger.drop_participant(people[0]), 2);
        assert_eq!(ledger.drop_topic(topics[1]), 1);
        assert!(ledger.matches_cross_product(&people[1..], &topics[..1]));

        // Unknown ids are a no-op
        assert_eq!(ledger.drop_participant(Uuid::new_v4()), 0);
    }

    #[test]
    fn test_turn_and_pass_counters() {
        let mut ledger = Ledger::new();
        let (p, t) = (Uuid::new_v4(), Uuid::new_v4());
        ledger.add_topic(t, &[p]);

        ledger.record_turn(p, t, 30);
        ledger.record_pass(p, t);
        ledger.record_turn(p, t, 12);

        let entry = ledger.get(p, t).unwrap();
        assert_eq!(entry.turn_count, 2);
        assert_eq!(entry.pass_count, 1);
        assert_eq!(entry.speaking_time_seconds, 42);
        assert!(entry.has_spoken);
        assert!(entry.has_passed);
    }

    #[test]
    fn test_pass_does_not_mark_spoken() {
        let mut ledger = Ledger::new();
        let (p, t) = (Uuid::new_v4(), Uuid::new_v4());
        ledger.add_topic(t, &[p]);

        ledger.grant_turn(p, t);
        ledger.record_pass(p, t);

        let entry = ledger.get(p, t).unwrap();
        assert!(!entry.has_spoken);
        assert_eq!(entry.speaking_time_seconds, 0);
        assert_eq!(entry.turn_count, 1);
    }

    #[test]
    fn test_missing_entry_is_created() {
        let mut ledger = Ledger::new();
        let (p, t) = (Uuid::new_v4(), Uuid::new_v4());

        ledger.record_pass(p, t);
        assert_eq!(ledger.get(p, t).unwrap().pass_count, 1);
    }

    #[test]
    fn test_accrual_on_untouched_entry_counts_a_turn() {
        let mut ledger = Ledger::new();
        let (p, t) = (Uuid::new_v4(), Uuid::new_v4());
        ledger.add_topic(t, &[p]);

        ledger.accrue_speaking_time(p, t, 0);
        assert!(ledger.get(p, t).unwrap().is_untouched());

        ledger.accrue_speaking_time(p, t, 4);
        let entry = ledger.get(p, t).unwrap();
        assert_eq!(entry.turn_count, 1);
        assert_eq!(entry.speaking_time_seconds, 4);
    }

    #[test]
    fn test_counters_never_decrease() {
        let mut ledger = Ledger::new();
        let (p, t) = (Uuid::new_v4(), Uuid::new_v4());
        ledger.add_topic(t, &[p]);

        let mut last = ledger.get(p, t).unwrap().clone();
        for step in 0..30u32 {
            match step % 4 {
                0 => ledger.record_turn(p, t, step),
                1 => ledger.record_pass(p, t),
                2 => ledger.accrue_speaking_time(p, t, step % 7),
                _ => ledger.complete_turn(p, t, 1),
            }
            let now = ledger.get(p, t).unwrap().clone();
            assert!(now.speaking_time_seconds >= last.speaking_time_seconds);
            assert!(now.turn_count >= last.turn_count);
            assert!(now.pass_count >= last.pass_count);
            last = now;
        }
    }

    #[test]
    fn test_reconcile_restores_cross_product() {
        let people = ids(2);
        let topic = Uuid::new_v4();
        let stale = LedgerEntry::new(Uuid::new_v4(), topic);
        let mut ledger = Ledger::from_entries(vec![LedgerEntry::new(people[0], topic), stale]);

        let (dropped, filled) = ledger.reconcile(&people, &[topic]);
        assert_eq!((dropped, filled), (1, 1));
        assert!(ledger.matches_cross_product(&people, &[topic]));
    }

    #[test]
    fn test_serializes_as_sorted_list() {
        let mut ledger = Ledger::new();
        let people = ids(3);
        ledger.add_topic(Uuid::new_v4(), &people);

        let json = serde_json::to_string(&ledger).unwrap();
        assert!(json.starts_with('['));
        let restored: Ledger = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, ledger);
        assert_eq!(serde_json::to_string(&restored).unwrap(), json);
    }
}
