use chrono::{DateTime, Duration, Local, Utc};
use clap::Subcommand;
use serde::{Deserialize, Serialize};
use timora_core::events::{Event, SessionCompletion};
use timora_core::storage::Database;
use timora_core::timer::{driver::TICK, SharedTimer, Ticker};
use timora_core::{Config, RewardLedger, SessionTimer, StreakPolicy, TimerMode, TimerSettings};
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::sync::SyncSession;
use super::{print_json, runtime, CmdResult};

const TIMER_KEY: &str = "session_timer";

#[derive(Subcommand)]
pub enum TimerAction {
    /// Print current timer state as JSON
    Status,
    /// Start or resume the countdown
    Start,
    /// Pause the countdown
    Pause,
    /// Re-arm the current mode
    Reset,
    /// Switch mode (focus, short, long)
    Mode {
        mode: TimerMode,
    },
    /// Tick in the foreground until the session completes (Ctrl-C pauses)
    Run,
}

/// The stored timer and the wall-clock instant its countdown was last
/// brought up to date. `ticked_at` is only set while running.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TimerClock {
    timer: SessionTimer,
    #[serde(default)]
    ticked_at: Option<DateTime<Utc>>,
}

impl TimerClock {
    fn new(timer: SessionTimer) -> Self {
        Self {
            timer,
            ticked_at: None,
        }
    }

    /// Count down the whole seconds that passed since the last invocation.
    /// The leftover fraction carries over to the next one.
    fn catch_up(&mut self, now: DateTime<Utc>) -> Option<Event> {
        let since = self.ticked_at?;
        if !self.timer.is_running() {
            self.ticked_at = None;
            return None;
        }
        let elapsed = (now - since).num_seconds();
        if elapsed < 0 {
            debug!(%since, %now, "clock went backwards");
            self.ticked_at = Some(now);
            return None;
        }
        self.ticked_at = Some(since + Duration::seconds(elapsed));
        self.timer.advance(elapsed.unsigned_abs())
    }

    /// Record when a running countdown was last current.
    fn settle(&mut self, now: DateTime<Utc>) {
        if self.timer.is_running() {
            self.ticked_at.get_or_insert(now);
        } else {
            self.ticked_at = None;
        }
    }
}

/// Timer settings follow the synced user record. A device that never synced
/// uses its config file.
async fn timer_settings(config: &Config) -> Result<TimerSettings, Box<dyn std::error::Error>> {
    let session = SyncSession::open(config).await?;
    Ok(session.timer_settings().unwrap_or_else(|| config.timer.settings()))
}

fn load_clock(db: &Database, settings: TimerSettings) -> Result<TimerClock, Box<dyn std::error::Error>> {
    let mut clock = match db.kv_get_json::<TimerClock>(TIMER_KEY)? {
        Some(clock) => clock,
        None => return Ok(TimerClock::new(SessionTimer::new(settings))),
    };
    if *clock.timer.settings() != settings {
        clock.timer.configure(settings);
    }
    Ok(clock)
}

fn save_clock(db: &Database, clock: &mut TimerClock) -> CmdResult {
    clock.settle(Utc::now());
    db.kv_set_json(TIMER_KEY, clock)?;
    Ok(())
}

pub fn run(action: TimerAction) -> CmdResult {
    let config = Config::load()?;
    let db = Database::open()?;
    runtime()?.block_on(run_async(action, &db, &config))
}

async fn run_async(action: TimerAction, db: &Database, config: &Config) -> CmdResult {
    let settings = timer_settings(config).await?;
    let mut clock = load_clock(db, settings)?;

    // A countdown left running by an earlier invocation may have finished.
    if let Some(Event::SessionComplete(completion)) = clock.catch_up(Utc::now()) {
        save_clock(db, &mut clock)?;
        reward(db, config, &completion).await?;
        print_json(&Event::SessionComplete(completion))?;
    }

    let event = match action {
        TimerAction::Status => None,
        TimerAction::Start => clock.timer.start(),
        TimerAction::Pause => clock.timer.pause(),
        TimerAction::Reset => clock.timer.reset(),
        TimerAction::Mode { mode } => clock.timer.set_mode(mode),
        TimerAction::Run => return run_foreground(db, config, clock).await,
    };

    save_clock(db, &mut clock)?;
    print_json(&event.unwrap_or_else(|| clock.timer.snapshot()))
}

async fn run_foreground(db: &Database, config: &Config, mut clock: TimerClock) -> CmdResult {
    if let Some(event) = clock.timer.start() {
        print_json(&event)?;
    }

    let shared = SharedTimer::new(clock.timer.clone());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let ticker = Ticker::spawn(shared.clone(), TICK, tx);

    let completion = tokio::select! {
        event = rx.recv() => event.as_ref().and_then(Event::as_completion).cloned(),
        _ = tokio::signal::ctrl_c() => {
            shared.with(SessionTimer::pause);
            None
        }
    };
    ticker.stop().await;

    clock.timer = shared.lock().clone();
    clock.ticked_at = None;
    save_clock(db, &mut clock)?;

    match completion {
        Some(completion) => {
            reward(db, config, &completion).await?;
            print_json(&Event::SessionComplete(completion))
        }
        None => print_json(&clock.timer.snapshot()),
    }
}

async fn reward(db: &Database, config: &Config, completion: &SessionCompletion) -> CmdResult {
    if !db.record_session(completion)? {
        info!(session_id = %completion.session_id, "session already recorded");
    }

    let session = SyncSession::open(config).await?;
    let today = Local::now().date_naive();
    session.handle.with(|c| {
        c.record_completion(&RewardLedger::default(), &StreakPolicy, completion, today)
    });
    session.finish().await?;
    Ok(())
}
