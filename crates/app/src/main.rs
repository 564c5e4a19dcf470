//! Talkstick - talking-token facilitation from the terminal
//!
//! Reads facilitator commands from stdin, drives the session engine and
//! persists every change so a restart picks up where it left off.

use std::path::PathBuf;

use talkstick_core::{Engine, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod closing;
mod console;
mod state;

use console::Command;
use state::AppState;

fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("Starting Talkstick");

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to create tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let app_state = match AppState::new(config_path) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(app_state)) {
        tracing::error!("Talkstick stopped: {}", e);
        std::process::exit(1);
    }
}

async fn run(state: AppState) -> Result<()> {
    let session = state.restore_session()?;
    let mut engine = Engine::new(session, state.config().timer);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Talkstick ready. Data in {}", state.data_dir().display());
    println!("{}", console::render_status(engine.session()));
    println!("Type 'help' for commands.");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                let command = match line.parse::<Command>() {
                    Ok(command) => command,
                    Err(e) => {
                        println!("{}", e);
                        continue;
                    }
                };

                match command {
                    Command::Quit => break,
                    Command::Help => println!("{}", console::HELP),
                    Command::History => {
                        for entry in state.history(10)? {
                            println!(
                                "{}  {}  {} topic(s)",
                                entry.stats.ended_at.format("%Y-%m-%d %H:%M"),
                                talkstick_core::stats::format_clock(entry.stats.total_duration_seconds),
                                entry.stats.topic_stats.len()
                            );
                        }
                    }
                    command => {
                        let outcome = console::execute(&mut engine, command);
                        println!("{}", outcome.message);
                        if let Some(stats) = &outcome.ended {
                            state.archive(stats)?;
                            println!("{}", closing::closing_line(stats, &mut rand::thread_rng()));
                        }
                        if outcome.changed {
                            state.persist(engine.session())?;
                        }
                    }
                }
            }
            update = engine.next_update() => {
                let holder = engine.session().token().current_holder;
                let was_running = engine.session().token().is_running;
                engine.apply_update(update);

                let token = engine.session().token();
                if token.current_holder != holder {
                    println!("Time's up. {}", console::holder_line(engine.session()));
                } else if was_running && !token.is_running {
                    println!("Time's up for {}.", engine.session().holder_name().unwrap_or("the speaker"));
                }
                state.persist(engine.session())?;
            }
        }
    }

    engine.pause();
    state.persist(engine.session())?;
    tracing::info!("Talkstick stopped");
    Ok(())
}
