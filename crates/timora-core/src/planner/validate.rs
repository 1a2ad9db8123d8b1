//! Rule compliance checks for plans of unknown origin.

use std::collections::HashSet;

use super::{BreakKind, DaySchedule, Plan, StudyRequest, TimeOfDay};
use crate::error::RuleViolation;
use crate::rules::RuleSet;

/// Check `plan` against `rules` for the given `request`.
///
/// The generator's own output always passes; this exists for plans produced
/// elsewhere, which are only shown when they pass too.
///
/// # Errors
/// Returns the first [`RuleViolation`] found.
pub fn validate(plan: &Plan, request: &StudyRequest, rules: &RuleSet) -> Result<(), RuleViolation> {
    let expected = u32::try_from(request.days).unwrap_or(0);
    if plan.days.len() != expected as usize {
        return Err(RuleViolation::DayCount {
            expected,
            actual: plan.days.len(),
        });
    }

    let subjects: HashSet<&str> = request.subjects.iter().map(|s| s.trim()).collect();
    let budget = u32::from(request.study_minutes_budget());

    for (i, day) in plan.days.iter().enumerate() {
        let n = i as u32 + 1;
        if day.day_index != n {
            return Err(RuleViolation::day(
                n,
                format!("out of order (labelled day {})", day.day_index),
            ));
        }
        check_timeline(day, rules)?;
        check_contents(day, &subjects, budget)?;
        check_break_cadence(day, rules)?;
    }
    Ok(())
}

fn check_timeline(day: &DaySchedule, rules: &RuleSet) -> Result<(), RuleViolation> {
    let d = day.day_index;
    let mut prev_end = TimeOfDay::MIDNIGHT;
    for slot in &day.slots {
        if slot.end <= slot.start {
            return Err(RuleViolation::day(
                d,
                format!("slot {} - {} is empty or crosses midnight", slot.start, slot.end),
            ));
        }
        if slot.start < prev_end {
            return Err(RuleViolation::day(
                d,
                format!("slot at {} overlaps the previous one", slot.start),
            ));
        }
        prev_end = slot.end;

        match slot.break_kind() {
            None if slot.duration_minutes() > rules.max_block_minutes => {
                return Err(RuleViolation::day(
                    d,
                    format!(
                        "{} block at {} lasts {} minutes (max {})",
                        slot.display_label(),
                        slot.start,
                        slot.duration_minutes(),
                        rules.max_block_minutes
                    ),
                ));
            }
            Some(BreakKind::MicroBreak) if !rules.micro_break.contains(slot.duration_minutes()) => {
                return Err(RuleViolation::day(
                    d,
                    format!("micro break at {} lasts {} minutes", slot.start, slot.duration_minutes()),
                ));
            }
            Some(BreakKind::LongBreak) if !rules.long_break.contains(slot.duration_minutes()) => {
                return Err(RuleViolation::day(
                    d,
                    format!("long break at {} lasts {} minutes", slot.start, slot.duration_minutes()),
                ));
            }
            _ => {}
        }
    }
    Ok(())
}

fn check_contents(
    day: &DaySchedule,
    subjects: &HashSet<&str>,
    budget: u32,
) -> Result<(), RuleViolation> {
    let d = day.day_index;
    for kind in BreakKind::MANDATORY {
        let count = day.count(kind);
        if count != 1 {
            return Err(RuleViolation::day(
                d,
                format!("expected exactly one {}, found {count}", kind.label()),
            ));
        }
    }

    if let Some(unknown) = day
        .study_blocks()
        .filter_map(|s| s.subject())
        .find(|s| !subjects.contains(s.trim()))
    {
        return Err(RuleViolation::day(d, format!("unrequested subject '{unknown}'")));
    }

    let studied = day.study_minutes();
    if studied > budget {
        return Err(RuleViolation::day(
            d,
            format!("{studied} study minutes exceed the daily cap of {budget}"),
        ));
    }
    Ok(())
}

/// Every pair of study blocks needs a rest between them, and no more than
/// `long_break_every` blocks may pass without a long one. Unscheduled gaps
/// count as rest.
fn check_break_cadence(day: &DaySchedule, rules: &RuleSet) -> Result<(), RuleViolation> {
    let d = day.day_index;
    let mut run = 0u16;
    let mut rest: Option<u16> = None;
    let mut prev_end: Option<TimeOfDay> = None;

    for slot in &day.slots {
        let gap = prev_end.map_or(0, |end| end.minutes_until(slot.start));
        prev_end = Some(slot.end);

        if !slot.is_study() {
            rest = Some(rest.unwrap_or(0) + gap + slot.duration_minutes());
            continue;
        }

        let rested = rest.take().map(|r| r + gap).unwrap_or(gap);
        if run > 0 {
            if rested < rules.micro_break.min_minutes {
                return Err(RuleViolation::day(
                    d,
                    format!("no break before the block at {}", slot.start),
                ));
            }
            if rested >= rules.long_break.min_minutes {
                run = 0;
            }
        }
        run += 1;
        if run > rules.long_break_every {
            return Err(RuleViolation::day(
                d,
                format!(
                    "{run} blocks in a row without a long break (max {})",
                    rules.long_break_every
                ),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{generate, Slot, SlotLabel};

    fn slot(start: &str, end: &str, label: SlotLabel) -> Slot {
        Slot {
            start: start.parse().unwrap(),
            end: end.parse().unwrap(),
            label,
            topic: None,
        }
    }

    fn study(start: &str, end: &str) -> Slot {
        slot(start, end, SlotLabel::Subject("Math".into()))
    }

    fn rest(start: &str, end: &str, kind: BreakKind) -> Slot {
        slot(start, end, SlotLabel::Break(kind))
    }

    fn one_day(slots: Vec<Slot>, hours: f64) -> (Plan, StudyRequest) {
        let request = StudyRequest::new(["Math"], hours, 1, "");
        let plan = Plan {
            meta: request.clone(),
            days: vec![DaySchedule { day_index: 1, slots }],
        };
        (plan, request)
    }

    fn with_meals(mut middle: Vec<Slot>) -> Vec<Slot> {
        let mut slots = vec![rest("07:00", "07:30", BreakKind::Breakfast)];
        slots.append(&mut middle);
        slots.push(rest("13:00", "14:00", BreakKind::Lunch));
        slots.push(rest("19:00", "20:00", BreakKind::Dinner));
        slots.push(rest("20:00", "21:00", BreakKind::FreeTime));
        slots
    }

    #[test]
    fn generated_plans_pass() {
        let rules = RuleSet::default();
        for hours in [0.5, 1.0, 3.0, 4.25, 8.0, 12.0, 24.0] {
            let req = StudyRequest::new(["Math", "Bio"], hours, 3, "");
            let plan = generate(&req, &rules).unwrap();
            validate(&plan, &req, &rules).unwrap();
        }
    }

    #[test]
    fn back_to_back_blocks_fail() {
        let slots = with_meals(vec![study("09:00", "10:00"), study("10:00", "11:00")]);
        let (plan, req) = one_day(slots, 2.0);
        let err = validate(&plan, &req, &RuleSet::default()).unwrap_err();
        assert!(err.to_string().contains("no break"), "{err}");
    }

    #[test]
    fn over_long_block_fails() {
        let slots = with_meals(vec![study("09:00", "10:30")]);
        let (plan, req) = one_day(slots, 2.0);
        assert!(validate(&plan, &req, &RuleSet::default()).is_err());
    }

    #[test]
    fn exceeding_daily_cap_fails() {
        let slots = with_meals(vec![
            study("09:00", "10:00"),
            rest("10:00", "10:10", BreakKind::MicroBreak),
            study("10:10", "11:10"),
        ]);
        let (plan, req) = one_day(slots, 1.5);
        let err = validate(&plan, &req, &RuleSet::default()).unwrap_err();
        assert!(err.to_string().contains("daily cap"), "{err}");
    }

    #[test]
    fn missing_dinner_fails() {
        let mut slots = with_meals(vec![study("09:00", "10:00")]);
        slots.retain(|s| s.break_kind() != Some(BreakKind::Dinner));
        let (plan, req) = one_day(slots, 1.0);
        let err = validate(&plan, &req, &RuleSet::default()).unwrap_err();
        assert!(err.to_string().contains("Dinner"), "{err}");
    }

    #[test]
    fn five_blocks_without_long_rest_fail() {
        let mut middle = Vec::new();
        let times = [
            ("08:00", "08:30"),
            ("08:40", "09:10"),
            ("09:20", "09:50"),
            ("10:00", "10:30"),
            ("10:40", "11:10"),
        ];
        for (i, (s, e)) in times.iter().enumerate() {
            if i > 0 {
                let (_, prev_end) = times[i - 1];
                middle.push(rest(prev_end, s, BreakKind::MicroBreak));
            }
            middle.push(study(s, e));
        }
        let (plan, req) = one_day(with_meals(middle), 3.0);
        let err = validate(&plan, &req, &RuleSet::default()).unwrap_err();
        assert!(err.to_string().contains("without a long break"), "{err}");
    }

    #[test]
    fn overlapping_slots_fail() {
        let mut slots = with_meals(vec![study("09:00", "10:00")]);
        slots.insert(2, rest("09:30", "09:45", BreakKind::MicroBreak));
        let (plan, req) = one_day(slots, 1.0);
        assert!(validate(&plan, &req, &RuleSet::default()).is_err());
    }

    #[test]
    fn wrong_day_count_fails() {
        let (plan, mut req) = one_day(with_meals(vec![]), 1.0);
        req.days = 2;
        assert_eq!(
            validate(&plan, &req, &RuleSet::default()),
            Err(RuleViolation::DayCount {
                expected: 2,
                actual: 1
            })
        );
    }
}
