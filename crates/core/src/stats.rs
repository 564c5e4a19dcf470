//! Statistics aggregator and plain-text recap
//!
//! `aggregate` is a pure function of its inputs: the same roster, topics,
//! ledger and timestamps always produce the same `SessionStats`.

use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::ledger::Ledger;
use crate::models::{ParticipantTopicStats, Participant, SessionStats, Topic, TopicStats};

/// `round(100 * part / total)`, zero when there is no total
pub fn percentage(part: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    ((part as f64 * 100.0) / total as f64).round() as u32
}

/// Format seconds as `MM:SS`; minutes keep counting past an hour
pub fn format_clock(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Build the recap for a session.
///
/// Participants and topics are reported in the order given. Missing ledger
/// entries count as zero.
pub fn aggregate(
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
    participants: &[Participant],
    topics: &[Topic],
    ledger: &Ledger,
) -> SessionStats {
    let total_duration_seconds = ended_at
        .signed_duration_since(started_at)
        .num_seconds()
        .max(0) as u64;

    let topic_stats = topics
        .iter()
        .map(|topic| {
            let total_speaking_seconds: u64 = ledger
                .for_topic(topic.id)
                .map(|e| e.speaking_time_seconds)
                .sum();

            let participant_stats = participants
                .iter()
                .map(|participant| {
                    let (speaking_time_seconds, turn_count, pass_count) = ledger
                        .get(participant.id, topic.id)
                        .map(|e| (e.speaking_time_seconds, e.turn_count, e.pass_count))
                        .unwrap_or((0, 0, 0));

                    ParticipantTopicStats {
                        participant_id: participant.id,
                        name: participant.name.clone(),
                        speaking_time_seconds,
                        turn_count,
                        pass_count,
                        share_percent: percentage(speaking_time_seconds, total_speaking_seconds),
                    }
                })
                .collect();

            TopicStats {
                topic_id: topic.id,
                title: topic.title.clone(),
                description: topic.description.clone(),
                total_speaking_seconds,
                session_share_percent: percentage(total_speaking_seconds, total_duration_seconds),
                participant_stats,
            }
        })
        .collect();

    SessionStats {
        started_at,
        ended_at,
        total_duration_seconds,
        topic_stats,
    }
}

impl SessionStats {
    /// Render the recap as plain text, suitable for pasting elsewhere
    pub fn render_text(&self) -> String {
        let mut out = String::new();

        // Writing to a String cannot fail
        let _ = writeln!(out, "SESSION RECAP");
        let _ = writeln!(out, "=============");
        let _ = writeln!(out);
        let _ = writeln!(out, "Total Duration: {}", format_clock(self.total_duration_seconds));
        let _ = writeln!(out);

        let _ = writeln!(out, "PARTICIPANTS");
        let _ = writeln!(out, "------------");
        let mut names: Vec<&str> = Vec::new();
        for topic in &self.topic_stats {
            for participant in &topic.participant_stats {
                if !names.contains(&participant.name.as_str()) {
                    names.push(&participant.name);
                }
            }
        }
        for name in names {
            let _ = writeln!(out, "- {}", name);
        }
        let _ = writeln!(out);

        let _ = writeln!(out, "TOPICS SUMMARY");
        let _ = writeln!(out, "--------------");
        for topic in &self.topic_stats {
            let _ = writeln!(
                out,
                "- {}: {} ({}% of session)",
                topic.title,
                format_clock(topic.total_speaking_seconds),
                topic.session_share_percent
            );
        }
        let _ = writeln!(out);

        let _ = writeln!(out, "DETAILED TOPIC PARTICIPATION");
        let _ = writeln!(out, "----------------------------");
        for topic in &self.topic_stats {
            let _ = writeln!(
                out,
                "Topic: {} - Duration: {}",
                topic.title,
                format_clock(topic.total_speaking_seconds)
            );
            if let Some(description) = &topic.description {
                let _ = writeln!(out, "Description: {}", description);
            }
            let _ = writeln!(out, "Participant Statistics:");
            // Turns include receipts that ended in a pass
            for p in &topic.participant_stats {
                let _ = writeln!(
                    out,
                    "  - {}: Speaking Time: {} ({}%), Turns: {}, Passes: {}",
                    p.name,
                    format_clock(p.speaking_time_seconds),
                    p.share_percent,
                    p.turn_count,
                    p.pass_count
                );
            }
            let _ = writeln!(out);
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn setup() -> (Vec<Participant>, Vec<Topic>, Ledger) {
        let participants = vec![
            Participant::new("Alice".to_string()),
            Participant::new("Bob".to_string()),
        ];
        let topics = vec![
            Topic::new("Roadmap".to_string()).with_description("Q3 plans".to_string()),
            Topic::new("Hiring".to_string()),
        ];
        let mut ledger = Ledger::new();
        let ids: Vec<_> = participants.iter().map(|p| p.id).collect();
        for topic in &topics {
            ledger.add_topic(topic.id, &ids);
        }
        (participants, topics, ledger)
    }

    #[test]
    fn test_percentage_rounding() {
        assert_eq!(percentage(80, 120), 67);
        assert_eq!(percentage(40, 120), 33);
        assert_eq!(percentage(1, 2), 50);
        assert_eq!(percentage(1, 8), 13);
        assert_eq!(percentage(5, 0), 0);
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(90), "01:30");
        assert_eq!(format_clock(3725), "62:05");
    }

    #[test]
    fn test_topic_shares() {
        let (participants, topics, mut ledger) = setup();
        let (alice, bob) = (participants[0].id, participants[1].id);
        let roadmap = topics[0].id;
        ledger.record_turn(alice, roadmap, 80);
        ledger.record_turn(bob, roadmap, 40);
        ledger.record_pass(bob, topics[1].id);

        let start = Utc::now();
        let stats = aggregate(start, start + Duration::seconds(600), &participants, &topics, &ledger);

        assert_eq!(stats.total_duration_seconds, 600);
        let t1 = &stats.topic_stats[0];
        assert_eq!(t1.total_speaking_seconds, 120);
        assert_eq!(t1.session_share_percent, 20);
        assert_eq!(t1.participant_stats[0].share_percent, 67);
        assert_eq!(t1.participant_stats[1].share_percent, 33);

        let t2 = &stats.topic_stats[1];
        assert_eq!(t2.total_speaking_seconds, 0);
        assert_eq!(t2.participant_stats[1].pass_count, 1);
        assert_eq!(t2.participant_stats[1].share_percent, 0);
    }

    #[test]
    fn test_missing_entries_default_to_zero() {
        let (participants, topics, _) = setup();
        let start = Utc::now();
        let stats = aggregate(start, start, &participants, &topics, &Ledger::new());

        assert_eq!(stats.topic_stats.len(), 2);
        for topic in &stats.topic_stats {
            assert_eq!(topic.participant_stats.len(), 2);
            assert!(topic.participant_stats.iter().all(|p| p.turn_count == 0));
        }
    }

    #[test]
    fn test_empty_session() {
        let start = Utc::now();
        let stats = aggregate(start, start, &[], &[], &Ledger::new());
        assert_eq!(stats.total_duration_seconds, 0);
        assert!(stats.topic_stats.is_empty());
    }

    #[test]
    fn test_end_before_start_clamps_to_zero() {
        let start = Utc::now();
        let stats = aggregate(start, start - Duration::seconds(5), &[], &[], &Ledger::new());
        assert_eq!(stats.total_duration_seconds, 0);
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let (participants, topics, mut ledger) = setup();
        ledger.record_turn(participants[0].id, topics[0].id, 15);
        let start = Utc::now();
        let end = start + Duration::seconds(42);

        let first = aggregate(start, end, &participants, &topics, &ledger);
        let second = aggregate(start, end, &participants, &topics, &ledger);
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
    }

    #[test]
    fn test_silent_pass_counts_turn_and_pass() {
        let (participants, topics, mut ledger) = setup();
        let (alice, roadmap) = (participants[0].id, topics[0].id);
        ledger.grant_turn(alice, roadmap);
        ledger.record_pass(alice, roadmap);

        let start = Utc::now();
        let stats = aggregate(start, start + Duration::seconds(60), &participants, &topics, &ledger);
        let line = &stats.topic_stats[0].participant_stats[0];
        assert_eq!((line.turn_count, line.pass_count, line.speaking_time_seconds), (1, 1, 0));
        assert!(stats
            .render_text()
            .contains("  - Alice: Speaking Time: 00:00 (0%), Turns: 1, Passes: 1"));
        assert!(!ledger.get(alice, roadmap).unwrap().has_spoken);
    }

    #[test]
    fn test_render_text() {
        let (participants, topics, mut ledger) = setup();
        ledger.record_turn(participants[0].id, topics[0].id, 75);
        let start = Utc::now();
        let stats = aggregate(start, start + Duration::seconds(150), &participants, &topics, &ledger);

        let text = stats.render_text();
        assert!(text.starts_with("SESSION RECAP"));
        assert!(text.contains("Total Duration: 02:30"));
        assert!(text.contains("- Roadmap: 01:15 (50% of session)"));
        assert!(text.contains("Description: Q3 plans"));
        assert!(text.contains("  - Alice: Speaking Time: 01:15 (100%), Turns: 1, Passes: 0"));
        assert_eq!(text.matches("- Bob\n").count(), 1);
    }
}
