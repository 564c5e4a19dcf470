//! Engine - an owned session wired to its timer
//!
//! The engine is the single writer of session state. Presentation code calls
//! its operations; the engine forwards them to the [`Session`] and then
//! drives the [`TimerService`] so that it mirrors the token's running state
//! and epoch. Elapsed-time updates come back through [`Engine::next_update`]
//! and are applied with [`Engine::apply_update`].

use chrono::Utc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::TimerConfig;
use crate::models::{PassPolicy, SessionStats, TurnStart};
use crate::session::{Session, SessionOp};
use crate::timer::{ElapsedUpdate, TimerService};

/// What the timer needs to know about the token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TimerPhase {
    epoch: u64,
    running: bool,
}

impl TimerPhase {
    fn of(session: &Session) -> Self {
        Self {
            epoch: session.token().epoch,
            running: session.token().is_running,
        }
    }
}

/// Session engine handle
pub struct Engine {
    session: Session,
    timer: Option<TimerService>,
    updates: Option<mpsc::UnboundedReceiver<ElapsedUpdate>>,
}

impl Engine {
    /// Build an engine and spawn its timer on the current tokio runtime.
    ///
    /// Outside a runtime the engine still works, but nothing ever counts
    /// down: the timer behaves as permanently paused.
    pub fn new(session: Session, timer_config: TimerConfig) -> Self {
        let mut engine = Self::without_timer(session);
        if Handle::try_current().is_ok() {
            let (timer, updates) = TimerService::spawn(timer_config);
            engine.timer = Some(timer);
            engine.updates = Some(updates);
            if engine.session.token().is_running {
                engine.timer_start();
            }
        } else {
            warn!("No async runtime available, speaking timer disabled");
        }
        engine
    }

    /// An engine with manual control only
    pub fn without_timer(session: Session) -> Self {
        Self {
            session,
            timer: None,
            updates: None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// An immutable copy of the current state
    pub fn snapshot(&self) -> Session {
        self.session.clone()
    }

    /// True while a live timer task backs this engine
    pub fn has_timer(&self) -> bool {
        self.timer.as_ref().is_some_and(TimerService::is_alive)
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    pub fn add_participant(&mut self, name: &str) -> Option<Uuid> {
        self.mutate(|s| s.add_participant(name))
    }

    pub fn remove_participant(&mut self, id: Uuid) {
        self.mutate(|s| s.remove_participant(id))
    }

    pub fn reset_participants(&mut self) {
        self.mutate(Session::reset_participants)
    }

    pub fn add_topic(&mut self, title: &str, description: Option<&str>) -> Option<Uuid> {
        self.mutate(|s| s.add_topic(title, description))
    }

    pub fn edit_topic(&mut self, id: Uuid, title: &str, description: Option<&str>) {
        self.mutate(|s| s.edit_topic(id, title, description))
    }

    pub fn remove_topic(&mut self, id: Uuid) {
        self.mutate(|s| s.remove_topic(id))
    }

    pub fn set_active_topic(&mut self, id: Uuid) {
        self.mutate(|s| s.set_active_topic(id))
    }

    pub fn pass_token_to(&mut self, id: Uuid) {
        self.mutate(|s| {
            s.start_session(Utc::now());
            s.pass_token_to(id)
        })
    }

    pub fn pass_without_speaking(&mut self) {
        self.mutate(Session::pass_without_speaking)
    }

    pub fn start(&mut self) {
        self.mutate(Session::start)
    }

    pub fn pause(&mut self) {
        self.mutate(Session::pause)
    }

    pub fn reset(&mut self) {
        self.mutate(Session::reset)
    }

    pub fn set_max_speaking_seconds(&mut self, value: u32) {
        self.mutate(|s| s.set_max_speaking_seconds(value))
    }

    pub fn set_pass_policy(&mut self, policy: PassPolicy) {
        self.mutate(|s| s.set_pass_policy(policy))
    }

    pub fn set_turn_start(&mut self, turn_start: TurnStart) {
        self.mutate(|s| s.set_turn_start(turn_start))
    }

    pub fn reset_all(&mut self) {
        self.mutate(Session::reset_all)
    }

    pub fn start_session(&mut self) {
        self.mutate(|s| s.start_session(Utc::now()))
    }

    /// Finish the session and return its recap
    pub fn end_session(&mut self) -> SessionStats {
        let stats = self.mutate(|s| s.end_session(Utc::now()));
        info!(
            total_seconds = stats.total_duration_seconds,
            topics = stats.topic_stats.len(),
            "Session ended"
        );
        stats
    }

    /// Apply an arbitrary operation
    pub fn apply(&mut self, op: SessionOp) {
        self.mutate(|s| s.apply(op))
    }

    // ------------------------------------------------------------------
    // Timer plumbing
    // ------------------------------------------------------------------

    /// Wait for the next elapsed-time update.
    ///
    /// Never resolves when the timer is unavailable.
    pub async fn next_update(&mut self) -> ElapsedUpdate {
        loop {
            match self.updates.as_mut() {
                Some(rx) => match rx.recv().await {
                    Some(update) => return update,
                    None => {
                        warn!("Timer stopped reporting, treating it as paused");
                        self.updates = None;
                    }
                },
                None => std::future::pending::<()>().await,
            }
        }
    }

    /// Apply one elapsed-time update. Returns the seconds credited.
    pub fn apply_update(&mut self, update: ElapsedUpdate) -> u32 {
        let before = TimerPhase::of(&self.session);
        let applied = self.session.apply_elapsed(update.epoch, update.seconds);
        self.sync_timer(before);
        applied
    }

    /// Apply every update already delivered. Returns how many were seen.
    pub fn pump(&mut self) -> usize {
        let mut seen = 0;
        while let Some(update) = self.updates.as_mut().and_then(|rx| rx.try_recv().ok()) {
            self.apply_update(update);
            seen += 1;
        }
        seen
    }

    fn mutate<R>(&mut self, f: impl FnOnce(&mut Session) -> R) -> R {
        // Updates already in hand belong to the state before this operation
        self.pump();
        let before = TimerPhase::of(&self.session);
        let out = f(&mut self.session);
        self.sync_timer(before);
        out
    }

    /// Bring the timer task in line with the session
    fn sync_timer(&mut self, before: TimerPhase) {
        let after = TimerPhase::of(&self.session);
        if after == before {
            return;
        }

        if after.epoch != before.epoch {
            self.timer_reset();
            if after.running {
                self.timer_start();
            }
        } else if after.running {
            self.timer_start();
        } else {
            self.timer_stop();
        }
    }

    fn timer_start(&mut self) {
        let epoch = self.session.token().epoch;
        if let Some(timer) = self.live_timer() {
            timer.start(epoch);
        }
    }

    fn timer_stop(&mut self) {
        if let Some(timer) = self.live_timer() {
            timer.stop();
        }
    }

    fn timer_reset(&mut self) {
        if let Some(timer) = self.live_timer() {
            timer.reset();
        }
    }

    fn live_timer(&mut self) -> Option<&TimerService> {
        if self.timer.as_ref().is_some_and(|t| !t.is_alive()) {
            warn!("Timer task is gone, speaking timer disabled");
            self.timer = None;
        }
        self.timer.as_ref()
    }
}
