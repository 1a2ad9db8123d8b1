//! Study plan generation.
//!
//! A [`StudyRequest`] (subjects, daily hours, number of days, goal) is turned
//! into a [`Plan`] of day-by-day [`Slot`]s by the deterministic
//! [`generate`] function. Plans from elsewhere (the optional remote
//! optimizer) go through [`validate`] before anyone sees them.
//!
//! ## Layout of one day
//!
//! ```text
//! Breakfast | block, break, block, ... (Lunch after the middle block) ... block | Dinner | Free Time
//! ```

mod generator;
pub mod optimizer;
mod time;
mod validate;
pub mod wire;

pub use generator::generate;
pub use optimizer::{plan_with_fallback, OptimizerClient, PlanOutcome, PlanSource};
pub use time::{TimeOfDay, MINUTES_PER_DAY};
pub use validate::validate;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ValidationError;
use crate::rules::RuleSet;

/// What the learner asked for. Immutable once handed to the generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyRequest {
    pub subjects: Vec<String>,
    #[serde(alias = "hours")]
    pub hours_per_day: f64,
    pub days: i64,
    #[serde(default)]
    pub goal: String,
}

impl StudyRequest {
    pub fn new(
        subjects: impl IntoIterator<Item = impl Into<String>>,
        hours_per_day: f64,
        days: i64,
        goal: impl Into<String>,
    ) -> Self {
        Self {
            subjects: subjects.into_iter().map(Into::into).collect(),
            hours_per_day,
            days,
            goal: goal.into(),
        }
    }

    /// Reject malformed requests before any generation happens.
    ///
    /// # Errors
    /// Returns a [`ValidationError`] naming the offending field.
    pub fn validate(&self, rules: &RuleSet) -> Result<(), ValidationError> {
        if self.subjects.is_empty() {
            return Err(ValidationError::EmptyCollection("subjects".into()));
        }
        if let Some(pos) = self.subjects.iter().position(|s| s.trim().is_empty()) {
            return Err(ValidationError::invalid(
                "subjects",
                format!("subject #{} is empty", pos + 1),
            ));
        }
        if !self.hours_per_day.is_finite() || self.hours_per_day <= 0.0 || self.hours_per_day > 24.0 {
            return Err(ValidationError::invalid(
                "hoursPerDay",
                format!("{} is not in (0, 24]", self.hours_per_day),
            ));
        }
        if self.days <= 0 {
            return Err(ValidationError::invalid("days", "must be a positive integer"));
        }
        if self.days > i64::from(rules.max_days) {
            return Err(ValidationError::invalid(
                "days",
                format!("at most {} days can be planned", rules.max_days),
            ));
        }
        Ok(())
    }

    /// Daily study budget in whole minutes, never rounded up.
    pub fn study_minutes_budget(&self) -> u16 {
        (self.hours_per_day * 60.0).floor().clamp(0.0, f64::from(MINUTES_PER_DAY)) as u16
    }

    /// Stable key for memoizing plans: the same request under the same rules
    /// always produces the same plan, so it always gets the same key.
    pub fn fingerprint(&self, rules: &RuleSet) -> String {
        let mut hasher = Sha256::new();
        // Serializing plain data structs cannot fail.
        hasher.update(serde_json::to_vec(self).unwrap_or_default());
        hasher.update(serde_json::to_vec(rules).unwrap_or_default());
        hex::encode(hasher.finalize())
    }
}

/// Non-study slot kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakKind {
    MicroBreak,
    LongBreak,
    Breakfast,
    Lunch,
    Dinner,
    FreeTime,
}

impl BreakKind {
    /// Slots every day must contain exactly once.
    pub const MANDATORY: [BreakKind; 4] = [
        BreakKind::Breakfast,
        BreakKind::Lunch,
        BreakKind::Dinner,
        BreakKind::FreeTime,
    ];

    /// Label used on the wire and in listings.
    pub fn label(self) -> &'static str {
        match self {
            BreakKind::MicroBreak => "Break",
            BreakKind::LongBreak => "Long Break",
            BreakKind::Breakfast => "Breakfast",
            BreakKind::Lunch => "Lunch",
            BreakKind::Dinner => "Dinner",
            BreakKind::FreeTime => "Free Time",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotLabel {
    Subject(String),
    Break(BreakKind),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
    pub label: SlotLabel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

impl Slot {
    pub fn duration_minutes(&self) -> u16 {
        self.start.minutes_until(self.end)
    }

    pub fn is_study(&self) -> bool {
        matches!(self.label, SlotLabel::Subject(_))
    }

    pub fn break_kind(&self) -> Option<BreakKind> {
        match self.label {
            SlotLabel::Break(kind) => Some(kind),
            SlotLabel::Subject(_) => None,
        }
    }

    pub fn subject(&self) -> Option<&str> {
        match &self.label {
            SlotLabel::Subject(name) => Some(name),
            SlotLabel::Break(_) => None,
        }
    }

    pub fn display_label(&self) -> &str {
        match &self.label {
            SlotLabel::Subject(name) => name,
            SlotLabel::Break(kind) => kind.label(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaySchedule {
    /// 1-based.
    pub day_index: u32,
    pub slots: Vec<Slot>,
}

impl DaySchedule {
    pub fn study_minutes(&self) -> u32 {
        self.slots
            .iter()
            .filter(|s| s.is_study())
            .map(|s| u32::from(s.duration_minutes()))
            .sum()
    }

    pub fn study_blocks(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter().filter(|s| s.is_study())
    }

    pub fn count(&self, kind: BreakKind) -> usize {
        self.slots
            .iter()
            .filter(|s| s.break_kind() == Some(kind))
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub meta: StudyRequest,
    pub days: Vec<DaySchedule>,
}

impl Plan {
    /// Study minutes per subject across the whole plan, in request order.
    pub fn minutes_by_subject(&self) -> Vec<(String, u32)> {
        self.meta
            .subjects
            .iter()
            .map(|subject| {
                let minutes = self
                    .days
                    .iter()
                    .flat_map(|d| d.study_blocks())
                    .filter(|s| s.subject() == Some(subject.as_str()))
                    .map(|s| u32::from(s.duration_minutes()))
                    .sum();
                (subject.clone(), minutes)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> StudyRequest {
        StudyRequest::new(["Math", "Physics"], 3.0, 1, "exam")
    }

    #[test]
    fn rejects_empty_subjects() {
        let mut req = request();
        req.subjects.clear();
        assert_eq!(
            req.validate(&RuleSet::default()),
            Err(ValidationError::EmptyCollection("subjects".into()))
        );
    }

    #[test]
    fn rejects_blank_subject_label() {
        let req = StudyRequest::new(["Math", "  "], 2.0, 1, "");
        assert!(req.validate(&RuleSet::default()).is_err());
    }

    #[test]
    fn rejects_out_of_range_hours_and_days() {
        let rules = RuleSet::default();
        for hours in [0.0, -1.0, 24.5, f64::NAN, f64::INFINITY] {
            let req = StudyRequest::new(["Math"], hours, 1, "");
            assert!(req.validate(&rules).is_err(), "hours {hours} accepted");
        }
        for days in [0, -3, 367] {
            let req = StudyRequest::new(["Math"], 2.0, days, "");
            assert!(req.validate(&rules).is_err(), "days {days} accepted");
        }
    }

    #[test]
    fn budget_is_floored() {
        let req = StudyRequest::new(["Math"], 2.999, 1, "");
        assert_eq!(req.study_minutes_budget(), 179);
    }

    #[test]
    fn fingerprint_is_stable_and_sensitive() {
        let rules = RuleSet::default();
        assert_eq!(request().fingerprint(&rules), request().fingerprint(&rules));

        let mut other = request();
        other.days = 2;
        assert_ne!(request().fingerprint(&rules), other.fingerprint(&rules));
    }

    #[test]
    fn request_uses_camel_case_on_the_wire() {
        let json = serde_json::to_value(request()).unwrap();
        assert_eq!(json["hoursPerDay"], 3.0);
        assert_eq!(json["subjects"][1], "Physics");
    }
}
