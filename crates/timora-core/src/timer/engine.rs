//! Session timer state machine.
//!
//! The timer counts whole seconds. It has no thread of its own: a tick
//! source (see [`driver`](super::driver)) calls `tick()` once per second, and
//! front ends call the commands in between.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running <-> Paused
//!            |
//!            +-- reaches 0 --> Paused (next mode armed, SessionComplete emitted)
//! ```
//!
//! `reset()` and `set_mode()` always land in Paused.

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::settings::{TimerMode, TimerSettings};
use crate::events::{Event, SessionCompletion};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Running,
    Paused,
}

/// Point-in-time view of the timer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub mode: TimerMode,
    pub run_state: RunState,
    pub remaining_seconds: u64,
    pub running: bool,
    pub sessions_completed: u32,
    pub sessions_before_long_break: u32,
    pub durations: Durations,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Durations {
    pub focus: u32,
    pub short: u32,
    pub long: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTimer {
    /// Latest configured values; they reach the countdown on the next arm.
    #[serde(deserialize_with = "deserialize_clamped")]
    settings: TimerSettings,
    mode: TimerMode,
    state: RunState,
    remaining_secs: u64,
    /// Length of the countdown currently armed.
    countdown_minutes: u32,
    session_id: Uuid,
    sessions_completed: u32,
}

impl Default for SessionTimer {
    fn default() -> Self {
        Self::new(TimerSettings::default())
    }
}

impl SessionTimer {
    /// Create an idle timer in Focus mode with the full focus duration armed.
    pub fn new(settings: TimerSettings) -> Self {
        let settings = clamp_logged(settings);
        let mut timer = Self {
            settings,
            mode: TimerMode::Focus,
            state: RunState::Idle,
            remaining_secs: 0,
            countdown_minutes: 0,
            session_id: Uuid::nil(),
            sessions_completed: 0,
        };
        timer.arm();
        timer
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    pub fn run_state(&self) -> RunState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == RunState::Running
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    pub fn sessions_completed(&self) -> u32 {
        self.sessions_completed
    }

    pub fn settings(&self) -> &TimerSettings {
        &self.settings
    }

    pub fn session_state(&self) -> SessionState {
        SessionState {
            mode: self.mode,
            run_state: self.state,
            remaining_seconds: self.remaining_secs,
            running: self.is_running(),
            sessions_completed: self.sessions_completed,
            sessions_before_long_break: self.settings.sessions_before_long_break,
            durations: Durations {
                focus: self.settings.focus_minutes,
                short: self.settings.short_break_minutes,
                long: self.settings.long_break_minutes,
            },
        }
    }

    pub fn snapshot(&self) -> Event {
        Event::StateSnapshot {
            state: self.session_state(),
            at: Utc::now(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self) -> Option<Event> {
        if self.state == RunState::Running {
            return None;
        }
        if self.remaining_secs == 0 {
            warn!(mode = ?self.mode, "timer started with nothing left on the clock, re-arming");
            self.arm();
        }
        self.state = RunState::Running;
        Some(Event::TimerStarted {
            mode: self.mode,
            remaining_secs: self.remaining_secs,
            at: Utc::now(),
        })
    }

    pub fn pause(&mut self) -> Option<Event> {
        if self.state != RunState::Running {
            return None;
        }
        self.state = RunState::Paused;
        Some(Event::TimerPaused {
            mode: self.mode,
            remaining_secs: self.remaining_secs,
            at: Utc::now(),
        })
    }

    pub fn reset(&mut self) -> Option<Event> {
        self.state = RunState::Paused;
        self.arm();
        Some(Event::TimerReset {
            mode: self.mode,
            remaining_secs: self.remaining_secs,
            at: Utc::now(),
        })
    }

    pub fn set_mode(&mut self, mode: TimerMode) -> Option<Event> {
        let from = self.mode;
        self.state = RunState::Paused;
        self.mode = mode;
        self.arm();
        Some(Event::ModeChanged {
            from,
            to: mode,
            remaining_secs: self.remaining_secs,
            at: Utc::now(),
        })
    }

    /// Store new settings. Zero values are raised to one.
    ///
    /// Before the first start the countdown is re-armed at once; otherwise
    /// the running or paused countdown keeps its length.
    pub fn configure(&mut self, settings: TimerSettings) -> Option<Event> {
        self.settings = clamp_logged(settings);
        let deferred = self.state != RunState::Idle;
        if !deferred {
            self.arm();
        }
        Some(Event::SettingsUpdated {
            settings: self.settings,
            deferred,
            at: Utc::now(),
        })
    }

    /// One second elapsed. Returns `Some(Event::SessionComplete)` exactly
    /// when the countdown reaches zero.
    pub fn tick(&mut self) -> Option<Event> {
        self.advance(1)
    }

    /// `ticks` seconds elapsed at once. Overshooting zero still completes
    /// only one session; the next countdown is left paused.
    pub fn advance(&mut self, ticks: u64) -> Option<Event> {
        if self.state != RunState::Running || ticks == 0 {
            return None;
        }
        if ticks < self.remaining_secs {
            self.remaining_secs -= ticks;
            return None;
        }
        self.remaining_secs = 0;
        Some(Event::SessionComplete(self.complete()))
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn complete(&mut self) -> SessionCompletion {
        let finished = self.mode;
        let next = match finished {
            TimerMode::Focus => {
                self.sessions_completed += 1;
                if self.sessions_completed % self.settings.sessions_before_long_break == 0 {
                    TimerMode::LongBreak
                } else {
                    TimerMode::ShortBreak
                }
            }
            TimerMode::ShortBreak | TimerMode::LongBreak => TimerMode::Focus,
        };

        let completion = SessionCompletion {
            session_id: self.session_id,
            mode: finished,
            sessions_completed: self.sessions_completed,
            duration_minutes: self.countdown_minutes,
            next_mode: next,
            at: Utc::now(),
        };
        info!(
            mode = ?finished,
            sessions_completed = self.sessions_completed,
            next = ?next,
            "session complete"
        );

        self.state = RunState::Paused;
        self.mode = next;
        self.arm();
        completion
    }

    /// Load the current mode's configured duration as a fresh countdown.
    fn arm(&mut self) {
        self.countdown_minutes = self.settings.minutes_for(self.mode);
        self.remaining_secs = self.settings.seconds_for(self.mode);
        self.session_id = Uuid::new_v4();
    }
}

/// Stored timers come from outside; they get the same clamping as `configure`.
fn deserialize_clamped<'de, D>(deserializer: D) -> Result<TimerSettings, D::Error>
where
    D: Deserializer<'de>,
{
    TimerSettings::deserialize(deserializer).map(clamp_logged)
}

fn clamp_logged(settings: TimerSettings) -> TimerSettings {
    let (settings, corrected) = settings.clamped();
    if !corrected.is_empty() {
        warn!(fields = ?corrected, "timer settings below one raised to one");
    }
    settings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick() -> TimerSettings {
        TimerSettings {
            focus_minutes: 1,
            short_break_minutes: 1,
            long_break_minutes: 2,
            sessions_before_long_break: 4,
        }
    }

    fn completions(timer: &mut SessionTimer, ticks: u64) -> Vec<SessionCompletion> {
        (0..ticks)
            .filter_map(|_| timer.tick())
            .filter_map(|e| e.as_completion().cloned())
            .collect()
    }

    #[test]
    fn start_pause_start() {
        let mut timer = SessionTimer::default();
        assert_eq!(timer.run_state(), RunState::Idle);

        assert!(timer.start().is_some());
        assert!(timer.start().is_none());
        assert!(timer.is_running());

        assert!(timer.pause().is_some());
        assert!(timer.pause().is_none());
        assert_eq!(timer.run_state(), RunState::Paused);

        assert!(timer.start().is_some());
        assert!(timer.is_running());
    }

    #[test]
    fn focus_completes_exactly_once() {
        let settings = TimerSettings::default();
        let mut timer = SessionTimer::new(settings);
        timer.start();

        let done = completions(&mut timer, u64::from(settings.focus_minutes) * 60);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].mode, TimerMode::Focus);
        assert_eq!(done[0].sessions_completed, 1);
        assert_eq!(done[0].duration_minutes, 25);
        assert_eq!(done[0].next_mode, TimerMode::ShortBreak);

        // Stopped after completion: further ticks do nothing.
        assert!(completions(&mut timer, 600).is_empty());
        assert_eq!(timer.mode(), TimerMode::ShortBreak);
        assert_eq!(timer.remaining_secs(), 5 * 60);
    }

    #[test]
    fn paused_timer_never_completes() {
        let mut timer = SessionTimer::new(quick());
        timer.start();
        assert!(completions(&mut timer, 59).is_empty());
        timer.pause();
        assert!(completions(&mut timer, 3600).is_empty());
        assert_eq!(timer.remaining_secs(), 1);
    }

    #[test]
    fn batched_ticks_fire_once() {
        let mut timer = SessionTimer::new(quick());
        timer.start();
        let event = timer.advance(10_000);
        assert!(matches!(event, Some(Event::SessionComplete(_))));
        assert!(timer.advance(10_000).is_none());
        assert_eq!(timer.sessions_completed(), 1);
    }

    #[test]
    fn fourth_focus_goes_to_long_break() {
        let mut timer = SessionTimer::new(quick());
        let mut next_modes = Vec::new();
        for _ in 0..4 {
            timer.set_mode(TimerMode::Focus);
            timer.start();
            let done = timer.advance(60).and_then(|e| e.as_completion().cloned()).unwrap();
            next_modes.push(done.next_mode);
        }
        assert_eq!(
            next_modes,
            [
                TimerMode::ShortBreak,
                TimerMode::ShortBreak,
                TimerMode::ShortBreak,
                TimerMode::LongBreak
            ]
        );
        assert_eq!(timer.mode(), TimerMode::LongBreak);
        assert_eq!(timer.remaining_secs(), 120);
    }

    #[test]
    fn break_completion_returns_to_focus_without_counting() {
        let mut timer = SessionTimer::new(quick());
        timer.set_mode(TimerMode::ShortBreak);
        timer.start();
        let done = timer.advance(60).and_then(|e| e.as_completion().cloned()).unwrap();
        assert_eq!(done.mode, TimerMode::ShortBreak);
        assert_eq!(done.sessions_completed, 0);
        assert_eq!(timer.mode(), TimerMode::Focus);
    }

    #[test]
    fn reset_restores_duration_and_keeps_count() {
        let mut timer = SessionTimer::new(quick());
        timer.start();
        timer.advance(60);
        timer.set_mode(TimerMode::Focus);
        timer.start();
        timer.advance(30);

        timer.reset();
        assert_eq!(timer.run_state(), RunState::Paused);
        assert_eq!(timer.remaining_secs(), 60);
        assert_eq!(timer.sessions_completed(), 1);
    }

    #[test]
    fn settings_change_waits_for_reset() {
        let mut timer = SessionTimer::new(quick());
        timer.start();
        timer.advance(10);

        let event = timer.configure(TimerSettings {
            focus_minutes: 50,
            ..quick()
        });
        assert!(matches!(
            event,
            Some(Event::SettingsUpdated { deferred: true, .. })
        ));
        assert_eq!(timer.remaining_secs(), 50);

        // The in-flight countdown still completes on its old length.
        let done = timer.advance(50).and_then(|e| e.as_completion().cloned()).unwrap();
        assert_eq!(done.duration_minutes, 1);

        timer.set_mode(TimerMode::Focus);
        assert_eq!(timer.remaining_secs(), 50 * 60);
    }

    #[test]
    fn configure_while_idle_applies_immediately() {
        let mut timer = SessionTimer::default();
        timer.configure(TimerSettings {
            focus_minutes: 40,
            ..TimerSettings::default()
        });
        assert_eq!(timer.remaining_secs(), 40 * 60);
    }

    #[test]
    fn zero_durations_are_clamped() {
        let mut timer = SessionTimer::new(TimerSettings {
            focus_minutes: 0,
            ..TimerSettings::default()
        });
        assert_eq!(timer.remaining_secs(), 60);
        timer.start();
        assert!(timer.advance(60).is_some());
    }

    #[test]
    fn each_countdown_gets_its_own_id() {
        let mut timer = SessionTimer::new(quick());
        timer.start();
        let a = timer.advance(60).and_then(|e| e.as_completion().cloned()).unwrap();
        timer.start();
        let b = timer.advance(60).and_then(|e| e.as_completion().cloned()).unwrap();
        assert_ne!(a.session_id, b.session_id);
    }

    #[test]
    fn snapshot_reports_state() {
        let timer = SessionTimer::default();
        match timer.snapshot() {
            Event::StateSnapshot { state, .. } => {
                assert_eq!(state.mode, TimerMode::Focus);
                assert_eq!(state.remaining_seconds, 25 * 60);
                assert!(!state.running);
                assert_eq!(state.sessions_before_long_break, 4);
                assert_eq!(state.durations.short, 5);
            }
            _ => panic!("Expected StateSnapshot"),
        }
    }

    #[test]
    fn survives_serialization() {
        let mut timer = SessionTimer::new(quick());
        timer.start();
        timer.advance(20);
        let json = serde_json::to_string(&timer).unwrap();
        let restored: SessionTimer = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.session_state(), timer.session_state());
    }

    #[test]
    fn stored_zero_cadence_is_clamped_on_load() {
        let mut timer = SessionTimer::new(quick());
        timer.start();
        let mut json = serde_json::to_value(&timer).unwrap();
        json["settings"]["sessionsBeforeLongBreak"] = 0.into();
        json["settings"]["focusMinutes"] = 0.into();

        let mut restored: SessionTimer = serde_json::from_value(json).unwrap();
        assert_eq!(restored.settings().sessions_before_long_break, 1);
        assert_eq!(restored.settings().focus_minutes, 1);
        let done = restored.advance(60).and_then(|e| e.as_completion().cloned()).unwrap();
        assert_eq!(done.next_mode, TimerMode::LongBreak);
    }
}
