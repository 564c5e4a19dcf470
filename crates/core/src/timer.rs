//! Timer service
//!
//! A background task that measures speaking time independently of whoever
//! consumes it. Time is measured against a monotonic anchor rather than by
//! counting ticks, so a late tick never loses or duplicates a second.
//! Sub-second remainders carry across pause/resume.
//!
//! Whole seconds are batched and reported at most every `flush_interval` or
//! once `flush_after_seconds` have accrued, whichever comes first. Each
//! report carries the epoch it was started with so the consumer can drop
//! updates that belong to a finished turn.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::config::TimerConfig;

/// Elapsed whole seconds for one turn epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElapsedUpdate {
    pub epoch: u64,
    pub seconds: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerCommand {
    Start { epoch: u64 },
    Stop,
    Reset,
}

/// Handle to the timer task. Dropping it ends the task.
#[derive(Debug)]
pub struct TimerService {
    cmd_tx: mpsc::UnboundedSender<TimerCommand>,
}

impl TimerService {
    /// Spawn the timer task on the current tokio runtime.
    ///
    /// Must be called from within a runtime context.
    pub fn spawn(config: TimerConfig) -> (Self, mpsc::UnboundedReceiver<ElapsedUpdate>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        tokio::spawn(timer_task(config, cmd_rx, update_tx));
        (Self { cmd_tx }, update_rx)
    }

    /// Begin accruing for `epoch`. Idempotent while running the same epoch.
    pub fn start(&self, epoch: u64) {
        self.send(TimerCommand::Start { epoch });
    }

    /// Halt and flush unreported whole seconds
    pub fn stop(&self) {
        self.send(TimerCommand::Stop);
    }

    /// Halt and discard anything unreported
    pub fn reset(&self) {
        self.send(TimerCommand::Reset);
    }

    /// False once the task has gone away
    pub fn is_alive(&self) -> bool {
        !self.cmd_tx.is_closed()
    }

    fn send(&self, cmd: TimerCommand) {
        if self.cmd_tx.send(cmd).is_err() {
            debug!(?cmd, "Timer task gone, command ignored");
        }
    }
}

/// One uninterrupted stretch of accrual
struct Run {
    epoch: u64,
    anchor: Instant,
    /// Whole seconds since `anchor` (plus carry) already counted
    counted: u64,
    unreported: u64,
    last_report: Instant,
    ticker: Interval,
}

impl Run {
    fn begin(epoch: u64, now: Instant, tick: Duration) -> Self {
        let mut ticker = interval_at(now + tick, tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            epoch,
            anchor: now,
            counted: 0,
            unreported: 0,
            last_report: now,
            ticker,
        }
    }

    /// Fold elapsed wall time into `unreported`
    fn accrue(&mut self, carry: Duration, now: Instant) {
        let whole = (carry + now.duration_since(self.anchor)).as_secs();
        self.unreported += whole.saturating_sub(self.counted);
        self.counted = whole;
    }

    /// Sub-second time left over when the run ends
    fn remainder(&self, carry: Duration, now: Instant) -> Duration {
        let total = carry + now.duration_since(self.anchor);
        total.saturating_sub(Duration::from_secs(total.as_secs()))
    }
}

async fn timer_task(
    config: TimerConfig,
    mut cmd_rx: mpsc::UnboundedReceiver<TimerCommand>,
    update_tx: mpsc::UnboundedSender<ElapsedUpdate>,
) {
    let tick = config.tick();
    let flush_interval = config.flush_interval();
    let flush_after = u64::from(config.flush_after_seconds);

    let mut run: Option<Run> = None;
    let mut carry = Duration::ZERO;
    let mut last_epoch: Option<u64> = None;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else {
                    debug!("Timer handle dropped, stopping task");
                    break;
                };
                let now = Instant::now();
                match cmd {
                    TimerCommand::Start { epoch } => {
                        if run.as_ref().is_some_and(|current| current.epoch == epoch) {
                            continue;
                        }
                        // Sub-second carry only belongs to the turn it came from
                        if last_epoch != Some(epoch) {
                            carry = Duration::ZERO;
                        }
                        last_epoch = Some(epoch);
                        run = Some(Run::begin(epoch, now, tick));
                    }
                    TimerCommand::Stop => {
                        if let Some(mut current) = run.take() {
                            current.accrue(carry, now);
                            carry = current.remainder(carry, now);
                            if current.unreported > 0
                                && !report(&update_tx, current.epoch, current.unreported)
                            {
                                break;
                            }
                        }
                    }
                    TimerCommand::Reset => {
                        run = None;
                        carry = Duration::ZERO;
                    }
                }
            }
            _ = next_tick(&mut run) => {
                let Some(current) = run.as_mut() else { continue };
                let now = Instant::now();
                current.accrue(carry, now);
                let due = current.unreported >= flush_after
                    || now.duration_since(current.last_report) >= flush_interval;
                if due && current.unreported > 0 {
                    if !report(&update_tx, current.epoch, current.unreported) {
                        break;
                    }
                    current.unreported = 0;
                    current.last_report = now;
                }
            }
        }
    }
}

/// Wait for the running ticker, or forever when stopped
fn next_tick(run: &mut Option<Run>) -> impl Future<Output = ()> + '_ {
    async move {
        match run {
            Some(current) => {
                current.ticker.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }
}

fn report(update_tx: &mpsc::UnboundedSender<ElapsedUpdate>, epoch: u64, seconds: u64) -> bool {
    let seconds = u32::try_from(seconds).unwrap_or(u32::MAX);
    if update_tx.send(ElapsedUpdate { epoch, seconds }).is_err() {
        warn!("Timer consumer gone, no further updates");
        return false;
    }
    true
}
