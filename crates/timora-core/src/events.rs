use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::timer::{SessionState, TimerMode, TimerSettings};

/// Every timer state change produces an Event.
/// Front ends render them; the reward and sync layers consume completions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        mode: TimerMode,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerPaused {
        mode: TimerMode,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerReset {
        mode: TimerMode,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    ModeChanged {
        from: TimerMode,
        to: TimerMode,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    /// `deferred` is true when a countdown is in flight and the new
    /// durations wait for the next reset or mode change.
    SettingsUpdated {
        settings: TimerSettings,
        deferred: bool,
        at: DateTime<Utc>,
    },
    SessionComplete(SessionCompletion),
    StateSnapshot {
        state: SessionState,
        at: DateTime<Utc>,
    },
}

/// One countdown reaching zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCompletion {
    /// Unique per countdown; the sync layer dedups rewards on it.
    pub session_id: Uuid,
    pub mode: TimerMode,
    /// Focus sessions completed so far, this one included.
    pub sessions_completed: u32,
    /// Length of the countdown that just finished.
    pub duration_minutes: u32,
    pub next_mode: TimerMode,
    pub at: DateTime<Utc>,
}

impl Event {
    pub fn as_completion(&self) -> Option<&SessionCompletion> {
        match self {
            Event::SessionComplete(c) => Some(c),
            _ => None,
        }
    }
}
