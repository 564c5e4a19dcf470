//! Closing remarks printed when a session ends

use rand::seq::SliceRandom;
use rand::Rng;
use talkstick_core::stats::format_clock;
use talkstick_core::SessionStats;

/// Pick a short closing line for the recap
pub fn closing_line<R: Rng + ?Sized>(stats: &SessionStats, rng: &mut R) -> String {
    let duration = format_clock(stats.total_duration_seconds);
    let voices = stats
        .topic_stats
        .iter()
        .flat_map(|t| &t.participant_stats)
        .filter(|p| p.speaking_time_seconds > 0)
        .map(|p| p.participant_id)
        .collect::<std::collections::HashSet<_>>()
        .len();

    if voices == 0 {
        return format!("Session closed after {}. Nobody took the floor.", duration);
    }

    let templates = [
        format!("Thanks, everyone. {} voices in {}.", voices, duration),
        format!("That's a wrap: {} of conversation.", duration),
        format!("Session closed after {}.", duration),
        format!("{} people spoke. Thanks for listening to each other.", voices),
    ];
    templates
        .choose(rng)
        .cloned()
        .unwrap_or_else(|| format!("Session closed after {}.", duration))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use talkstick_core::{ParticipantTopicStats, TopicStats};
    use uuid::Uuid;

    fn stats(speaking: &[u64]) -> SessionStats {
        let now = Utc::now();
        SessionStats {
            started_at: now,
            ended_at: now,
            total_duration_seconds: 125,
            topic_stats: vec![TopicStats {
                topic_id: Uuid::new_v4(),
                title: "Retro".to_string(),
                description: None,
                total_speaking_seconds: speaking.iter().sum(),
                session_share_percent: 100,
                participant_stats: speaking
                    .iter()
                    .map(|&s| ParticipantTopicStats {
                        participant_id: Uuid::new_v4(),
                        name: "Someone".to_string(),
                        speaking_time_seconds: s,
                        turn_count: 1,
                        pass_count: 0,
                        share_percent: 0,
                    })
                    .collect(),
            }],
        }
    }

    #[test]
    fn test_silent_session() {
        let mut rng = StdRng::seed_from_u64(7);
        let line = closing_line(&stats(&[0, 0]), &mut rng);
        assert_eq!(line, "Session closed after 02:05. Nobody took the floor.");
    }

    #[test]
    fn test_lines_mention_session() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let line = closing_line(&stats(&[30, 0, 12]), &mut rng);
            assert!(line.contains("02:05") || line.contains("2 people"), "{}", line);
        }
    }
}
