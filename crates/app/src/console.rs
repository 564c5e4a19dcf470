//! Console commands for the facilitator
//!
//! One line of input parses into a [`Command`]; [`execute`] runs it against
//! the engine and reports what happened. Participants and topics are named
//! either by their 1-based position in the listing or by name/title.

use std::fmt::Write;
use std::str::FromStr;

use talkstick_core::stats::format_clock;
use talkstick_core::{Engine, PassPolicy, Session, SessionStats, TurnStart};
use uuid::Uuid;

pub const HELP: &str = "\
Commands:
  add <name>                     add a participant
  remove <who>                   remove a participant
  clear-roster                   remove every participant
  topic <title> [| description]  add a topic
  edit-topic <which> <title> [| description]
  drop-topic <which>             remove a topic
  focus <which>                  make a topic current
  pass <who>                     hand the token over
  skip                           holder passes without speaking
  start | pause | reset          control the speaking timer
  budget <seconds>               per-turn speaking budget
  policy automatic|facilitator   what happens when time runs out
  turn-start auto_start|paused   whether a new turn starts counting
  status                         show the session
  end                            end the session and print the recap
  recap                          print the last recap
  history                        list archived sessions
  reset-all                      clear roster and topics
  help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add(String),
    Remove(String),
    ClearRoster,
    Topic {
        title: String,
        description: Option<String>,
    },
    EditTopic {
        target: String,
        title: String,
        description: Option<String>,
    },
    DropTopic(String),
    Focus(String),
    Pass(String),
    Skip,
    Start,
    Pause,
    Reset,
    Budget(u32),
    Policy(PassPolicy),
    TurnStart(TurnStart),
    Status,
    End,
    Recap,
    History,
    ResetAll,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        let word = word.to_ascii_lowercase();
        let required = |usage: &str| {
            if rest.is_empty() {
                Err(format!("usage: {} {}", word, usage))
            } else {
                Ok(rest.to_string())
            }
        };

        let command = match word.as_str() {
            "add" => Self::Add(required("<name>")?),
            "remove" => Self::Remove(required("<who>")?),
            "clear-roster" => Self::ClearRoster,
            "topic" => {
                let (title, description) = split_description(&required("<title> [| description]")?);
                Self::Topic { title, description }
            }
            "edit-topic" => {
                let args = required("<which> <title> [| description]")?;
                let (target, remainder) = args
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| "usage: edit-topic <which> <title> [| description]".to_string())?;
                let (title, description) = split_description(remainder);
                Self::EditTopic {
                    target: target.to_string(),
                    title,
                    description,
                }
            }
            "drop-topic" => Self::DropTopic(required("<which>")?),
            "focus" => Self::Focus(required("<which>")?),
            "pass" => Self::Pass(required("<who>")?),
            "skip" => Self::Skip,
            "start" => Self::Start,
            "pause" => Self::Pause,
            "reset" => Self::Reset,
            "budget" => {
                let seconds = required("<seconds>")?;
                let seconds = seconds
                    .parse::<u32>()
                    .map_err(|_| format!("not a number of seconds: {}", seconds))?;
                Self::Budget(seconds)
            }
            "policy" => {
                let value = required("automatic|facilitator")?;
                Self::Policy(PassPolicy::parse(&value).ok_or_else(|| format!("unknown policy: {}", value))?)
            }
            "turn-start" => {
                let value = required("auto_start|paused")?;
                Self::TurnStart(
                    TurnStart::parse(&value).ok_or_else(|| format!("unknown turn start: {}", value))?,
                )
            }
            "status" | "ls" => Self::Status,
            "end" => Self::End,
            "recap" => Self::Recap,
            "history" => Self::History,
            "reset-all" => Self::ResetAll,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => return Err(format!("unknown command: {} (try 'help')", other)),
        };
        Ok(command)
    }
}

fn split_description(text: &str) -> (String, Option<String>) {
    match text.split_once('|') {
        Some((title, description)) => {
            let description = description.trim();
            (
                title.trim().to_string(),
                (!description.is_empty()).then(|| description.to_string()),
            )
        }
        None => (text.trim().to_string(), None),
    }
}

/// What a command did
#[derive(Debug, Default)]
pub struct Outcome {
    pub message: String,
    /// Session state changed and should be saved
    pub changed: bool,
    /// The session ended with this recap
    pub ended: Option<SessionStats>,
}

impl Outcome {
    fn changed(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            changed: true,
            ended: None,
        }
    }

    fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            changed: false,
            ended: None,
        }
    }
}

/// Run a command against the engine.
///
/// `History`, `Help` and `Quit` need the surrounding application and are
/// reported back untouched.
pub fn execute(engine: &mut Engine, command: Command) -> Outcome {
    match command {
        Command::Add(name) => match engine.add_participant(&name) {
            Some(_) => Outcome::changed(format!("Added {}", name.trim())),
            None => Outcome::info("A participant needs a name"),
        },
        Command::Remove(who) => match find_participant(engine.session(), &who) {
            Some(id) => {
                engine.remove_participant(id);
                Outcome::changed(format!("Removed {}", who))
            }
            None => Outcome::info(format!("No participant {}", who)),
        },
        Command::ClearRoster => {
            engine.reset_participants();
            Outcome::changed("Roster cleared")
        }
        Command::Topic { title, description } => {
            match engine.add_topic(&title, description.as_deref()) {
                Some(_) => Outcome::changed(format!("Added topic {}", title)),
                None => Outcome::info("A topic needs a title"),
            }
        }
        Command::EditTopic {
            target,
            title,
            description,
        } => match find_topic(engine.session(), &target) {
            Some(id) if !title.is_empty() => {
                engine.edit_topic(id, &title, description.as_deref());
                Outcome::changed(format!("Topic is now {}", title))
            }
            Some(_) => Outcome::info("A topic needs a title"),
            None => Outcome::info(format!("No topic {}", target)),
        },
        Command::DropTopic(which) => match find_topic(engine.session(), &which) {
            Some(id) => {
                engine.remove_topic(id);
                Outcome::changed(format!("Dropped topic {}", which))
            }
            None => Outcome::info(format!("No topic {}", which)),
        },
        Command::Focus(which) => match find_topic(engine.session(), &which) {
            Some(id) => {
                engine.set_active_topic(id);
                Outcome::changed(format!("Now discussing {}", which))
            }
            None => Outcome::info(format!("No topic {}", which)),
        },
        Command::Pass(who) => match find_participant(engine.session(), &who) {
            Some(id) => {
                engine.pass_token_to(id);
                Outcome::changed(holder_line(engine.session()))
            }
            None => Outcome::info(format!("No participant {}", who)),
        },
        Command::Skip => {
            engine.pass_without_speaking();
            Outcome::changed(holder_line(engine.session()))
        }
        Command::Start => {
            engine.start();
            Outcome::changed(clock_line(engine.session()))
        }
        Command::Pause => {
            engine.pause();
            Outcome::changed(clock_line(engine.session()))
        }
        Command::Reset => {
            engine.reset();
            Outcome::changed(clock_line(engine.session()))
        }
        Command::Budget(seconds) => {
            engine.set_max_speaking_seconds(seconds);
            Outcome::changed(format!(
                "Speaking budget {}",
                format_clock(u64::from(engine.session().token().max_speaking_seconds))
            ))
        }
        Command::Policy(policy) => {
            engine.set_pass_policy(policy);
            Outcome::changed(format!("Pass policy {}", policy.as_str()))
        }
        Command::TurnStart(turn_start) => {
            engine.set_turn_start(turn_start);
            Outcome::changed(format!("Turn start {}", turn_start.as_str()))
        }
        Command::Status => Outcome::info(render_status(engine.session())),
        Command::End => {
            let stats = engine.end_session();
            Outcome {
                message: stats.render_text(),
                changed: true,
                ended: Some(stats),
            }
        }
        Command::Recap => match engine.session().last_stats() {
            Some(stats) => Outcome::info(stats.render_text()),
            None => Outcome::info("No session has ended yet"),
        },
        Command::ResetAll => {
            engine.reset_all();
            Outcome::changed("Everything cleared")
        }
        Command::History | Command::Help | Command::Quit => Outcome::default(),
    }
}

/// Resolve a 1-based position or a case-insensitive name
pub fn find_participant(session: &Session, reference: &str) -> Option<Uuid> {
    let reference = reference.trim();
    if let Ok(position) = reference.parse::<usize>() {
        return position
            .checked_sub(1)
            .and_then(|i| session.participants().get(i))
            .map(|p| p.id);
    }
    session
        .participants()
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case(reference))
        .map(|p| p.id)
}

/// Resolve a 1-based position or a case-insensitive title
pub fn find_topic(session: &Session, reference: &str) -> Option<Uuid> {
    let reference = reference.trim();
    if let Ok(position) = reference.parse::<usize>() {
        return position
            .checked_sub(1)
            .and_then(|i| session.topics().get(i))
            .map(|t| t.id);
    }
    session
        .topics()
        .iter()
        .find(|t| t.title.eq_ignore_ascii_case(reference))
        .map(|t| t.id)
}

pub fn holder_line(session: &Session) -> String {
    match session.holder_name() {
        Some(name) => format!("{} has the token. {}", name, clock_line(session)),
        None => "Nobody holds the token".to_string(),
    }
}

pub fn clock_line(session: &Session) -> String {
    let token = session.token();
    format!(
        "{} remaining ({})",
        format_clock(u64::from(token.time_remaining_seconds)),
        if token.is_running { "running" } else { "paused" }
    )
}

pub fn render_status(session: &Session) -> String {
    let mut out = String::new();
    let token = session.token();

    let _ = writeln!(
        out,
        "Topic: {}",
        session.current_topic().map_or("(none)", |t| t.title.as_str())
    );
    let _ = writeln!(out, "{}", holder_line(session));
    let _ = writeln!(
        out,
        "Budget {} | policy {} | turn start {}",
        format_clock(u64::from(token.max_speaking_seconds)),
        session.settings().pass_policy.as_str(),
        session.settings().turn_start.as_str()
    );

    let _ = writeln!(out, "Participants:");
    for (i, p) in session.participants().iter().enumerate() {
        let marker = if token.current_holder == Some(p.id) { " *" } else { "" };
        let _ = writeln!(
            out,
            "  {}. {}  {}  turns {}{}",
            i + 1,
            p.name,
            format_clock(p.speaking_time_seconds),
            p.turn_count,
            marker
        );
    }

    let _ = writeln!(out, "Topics:");
    for (i, t) in session.topics().iter().enumerate() {
        let marker = if t.is_active { " (current)" } else { "" };
        let _ = writeln!(out, "  {}. {}{}", i + 1, t.title, marker);
    }

    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use talkstick_core::SessionSettings;

    fn engine() -> Engine {
        Engine::without_timer(Session::new(60, SessionSettings::default()))
    }

    fn run(engine: &mut Engine, line: &str) -> Outcome {
        execute(engine, line.parse().unwrap())
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!("skip".parse::<Command>(), Ok(Command::Skip));
        assert_eq!("  STATUS ".parse::<Command>(), Ok(Command::Status));
        assert_eq!("add Mary Ann".parse::<Command>(), Ok(Command::Add("Mary Ann".to_string())));
        assert_eq!("budget 45".parse::<Command>(), Ok(Command::Budget(45)));
        assert_eq!(
            "policy auto".parse::<Command>(),
            Ok(Command::Policy(PassPolicy::Automatic))
        );
    }

    #[test]
    fn test_parse_topic_description() {
        assert_eq!(
            "topic Roadmap | next quarter".parse::<Command>(),
            Ok(Command::Topic {
                title: "Roadmap".to_string(),
                description: Some("next quarter".to_string()),
            })
        );
        assert_eq!(
            "edit-topic 2 Hiring plan".parse::<Command>(),
            Ok(Command::EditTopic {
                target: "2".to_string(),
                title: "Hiring plan".to_string(),
                description: None,
            })
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!("add".parse::<Command>().unwrap_err().starts_with("usage"));
        assert!("budget soon".parse::<Command>().is_err());
        assert!("policy sometimes".parse::<Command>().is_err());
        assert!("dance".parse::<Command>().unwrap_err().contains("unknown command"));
        assert!("edit-topic 1".parse::<Command>().is_err());
    }

    #[test]
    fn test_facilitated_round() {
        let mut engine = engine();
        run(&mut engine, "add Alice");
        run(&mut engine, "add Bob");
        run(&mut engine, "topic Retro");

        let outcome = run(&mut engine, "pass alice");
        assert!(outcome.changed);
        assert!(outcome.message.starts_with("Alice has the token"));

        run(&mut engine, "pass 2");
        assert_eq!(engine.session().holder_name(), Some("Bob"));

        let outcome = run(&mut engine, "end");
        let stats = outcome.ended.unwrap();
        assert_eq!(stats.topic_stats.len(), 1);
        assert!(outcome.message.contains("SESSION RECAP"));
        assert!(run(&mut engine, "recap").message.contains("Retro"));
    }

    #[test]
    fn test_unknown_references_change_nothing() {
        let mut engine = engine();
        run(&mut engine, "add Alice");

        let outcome = run(&mut engine, "pass Zed");
        assert!(!outcome.changed);
        assert!(run(&mut engine, "remove 0").message.contains("No participant"));
        assert!(run(&mut engine, "focus Budget").message.contains("No topic"));
        assert_eq!(engine.session().participants().len(), 1);
    }

    #[test]
    fn test_status_marks_holder_and_topic() {
        let mut engine = engine();
        run(&mut engine, "add Alice");
        run(&mut engine, "topic Retro");
        run(&mut engine, "pass 1");

        let status = run(&mut engine, "status").message;
        assert!(status.contains("1. Alice  00:00  turns 1 *"));
        assert!(status.contains("1. Retro (current)"));
        assert!(status.contains("01:00 remaining (paused)"));
    }
}
