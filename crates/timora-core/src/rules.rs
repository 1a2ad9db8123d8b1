//! Declarative scheduling rules.
//!
//! A [`RuleSet`] is pure data. The planner builds plans that satisfy it and
//! the validator checks foreign plans (e.g. from a remote optimizer) against
//! it. The daily study cap itself comes from the request.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::planner::{BreakKind, TimeOfDay};

/// Allowed duration window for a kind of break, plus the duration the
/// generator actually uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakWindow {
    pub min_minutes: u16,
    pub max_minutes: u16,
    pub planned_minutes: u16,
}

impl BreakWindow {
    pub fn contains(&self, minutes: u16) -> bool {
        (self.min_minutes..=self.max_minutes).contains(&minutes)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    /// Longest single study block.
    pub max_block_minutes: u16,
    /// A fractional remainder shorter than this is not scheduled as study.
    pub min_block_minutes: u16,
    pub micro_break: BreakWindow,
    pub long_break: BreakWindow,
    /// A long break replaces the micro break after this many blocks.
    pub long_break_every: u16,
    pub breakfast_minutes: u16,
    pub lunch_minutes: u16,
    pub dinner_minutes: u16,
    pub free_time_minutes: u16,
    /// Anchor the first slot of every day starts at.
    pub day_start: TimeOfDay,
    /// Descriptive labels rotated over study blocks.
    pub topics: Vec<String>,
    /// Generic rest labels accepted from an external optimizer.
    pub rest_labels: Vec<String>,
    pub max_days: u32,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            max_block_minutes: 60,
            min_block_minutes: 15,
            micro_break: BreakWindow {
                min_minutes: 10,
                max_minutes: 15,
                planned_minutes: 10,
            },
            long_break: BreakWindow {
                min_minutes: 30,
                max_minutes: 60,
                planned_minutes: 30,
            },
            long_break_every: 4,
            breakfast_minutes: 30,
            lunch_minutes: 60,
            dinner_minutes: 60,
            free_time_minutes: 60,
            day_start: TimeOfDay::from_minutes(9 * 60).unwrap_or(TimeOfDay::MIDNIGHT),
            topics: vec!["Practice".into(), "Revision".into(), "Theory".into()],
            rest_labels: vec![
                "Break".into(),
                "Rest".into(),
                "Snack Break".into(),
                "Nap".into(),
                "Stretching".into(),
                "Walk".into(),
            ],
            max_days: 366,
        }
    }
}

impl RuleSet {
    /// Base duration of a fixed (non-study) slot.
    pub fn fixed_minutes(&self, kind: BreakKind) -> u16 {
        match kind {
            BreakKind::MicroBreak => self.micro_break.planned_minutes,
            BreakKind::LongBreak => self.long_break.planned_minutes,
            BreakKind::Breakfast => self.breakfast_minutes,
            BreakKind::Lunch => self.lunch_minutes,
            BreakKind::Dinner => self.dinner_minutes,
            BreakKind::FreeTime => self.free_time_minutes,
        }
    }

    /// Minutes per day taken by the mandatory meal and free-time slots.
    pub fn mandatory_minutes(&self) -> u16 {
        BreakKind::MANDATORY
            .iter()
            .map(|k| self.fixed_minutes(*k))
            .fold(0u16, u16::saturating_add)
    }

    /// Check internal consistency.
    ///
    /// # Errors
    /// Returns `UnsatisfiableRules` when windows are inverted, durations are
    /// zero, or the mandatory slots cannot fit between the anchor and 24:00.
    pub fn check(&self) -> Result<(), ValidationError> {
        let fail = |msg: String| Err(ValidationError::UnsatisfiableRules(msg));

        if self.max_block_minutes == 0 {
            return fail("max_block_minutes must be positive".into());
        }
        if self.min_block_minutes > self.max_block_minutes {
            return fail("min_block_minutes exceeds max_block_minutes".into());
        }
        if self.long_break_every == 0 {
            return fail("long_break_every must be at least 1".into());
        }
        for (name, w) in [("micro_break", &self.micro_break), ("long_break", &self.long_break)] {
            if w.min_minutes == 0
                || w.min_minutes > w.max_minutes
                || !w.contains(w.planned_minutes)
            {
                return fail(format!(
                    "{name} window {}..={} with planned {} is invalid",
                    w.min_minutes, w.max_minutes, w.planned_minutes
                ));
            }
        }
        if self.micro_break.max_minutes >= self.long_break.min_minutes {
            return fail("micro and long break windows overlap".into());
        }
        if self.max_days == 0 {
            return fail("max_days must be positive".into());
        }
        let available = self.day_start.minutes_until(TimeOfDay::END_OF_DAY);
        if self.mandatory_minutes() > available {
            return fail(format!(
                "meals and free time need {} minutes but only {} remain after {}",
                self.mandatory_minutes(),
                available,
                self.day_start
            ));
        }
        Ok(())
    }

    /// Whether `label` is one of the generic rest labels.
    pub fn is_rest_label(&self, label: &str) -> bool {
        self.rest_labels.iter().any(|l| l.eq_ignore_ascii_case(label))
    }
}
