//! Progress counters and the rules that move them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::events::SessionCompletion;
use crate::timer::TimerMode;

/// Coins granted to a freshly created account.
pub const WELCOME_COINS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    pub coins: u64,
    pub total_focus_hours: f64,
    pub current_streak: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_active_day: Option<NaiveDate>,
}

impl Default for UserProgress {
    fn default() -> Self {
        Self {
            coins: 0,
            total_focus_hours: 0.0,
            current_streak: 0,
            last_active_day: None,
        }
    }
}

impl UserProgress {
    /// Progress of an account that was just created.
    pub fn new_account() -> Self {
        Self {
            coins: WELCOME_COINS,
            ..Self::default()
        }
    }

    /// Zero every counter. Only ever done on explicit user request.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Turns completed sessions into progress.
///
/// Has no memory of what it already paid for: feeding it the
/// same completion twice pays twice. Deduplication belongs to
/// [`SyncCoordinator`](crate::sync::SyncCoordinator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewardLedger {
    pub fixed_reward: u64,
}

impl Default for RewardLedger {
    fn default() -> Self {
        Self { fixed_reward: 10 }
    }
}

impl RewardLedger {
    pub fn apply_completion(&self, progress: &UserProgress, event: &SessionCompletion) -> UserProgress {
        let mut next = progress.clone();
        if event.mode == TimerMode::Focus {
            next.coins = next.coins.saturating_add(self.fixed_reward);
            next.total_focus_hours += f64::from(event.duration_minutes) / 60.0;
        }
        next
    }
}

/// Daily streak bookkeeping, applied alongside the ledger by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreakPolicy;

impl StreakPolicy {
    /// Record activity on `today`: the streak grows on consecutive days,
    /// holds within a day and restarts at 1 after a gap.
    pub fn apply(&self, progress: &UserProgress, today: NaiveDate) -> UserProgress {
        let mut next = progress.clone();
        next.current_streak = match progress.last_active_day {
            Some(last) if last == today => progress.current_streak.max(1),
            Some(last) if last.succ_opt() == Some(today) => progress.current_streak.saturating_add(1),
            // Clock moved back; leave the record alone.
            Some(last) if last > today => return next,
            _ => 1,
        };
        next.last_active_day = Some(today);
        next
    }
}
