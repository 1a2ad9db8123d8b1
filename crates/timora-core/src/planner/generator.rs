//! Deterministic, rule-compliant plan generation.
//!
//! The daily budget is cut into blocks of at most `max_block_minutes`,
//! subjects are assigned round-robin with a per-day rotation offset, and
//! breaks, meals and free time are interleaved before times are laid out
//! sequentially from the day-start anchor.

use tracing::{debug, warn};

use super::{BreakKind, DaySchedule, Plan, Slot, SlotLabel, StudyRequest, TimeOfDay};
use crate::error::Result;
use crate::rules::RuleSet;

/// Build a plan for `request` under `rules`.
///
/// Pure and total for valid input: no I/O, no clock, no randomness, so equal
/// inputs always give equal plans.
///
/// # Errors
/// Returns `CoreError::Validation` for malformed requests or a rule set whose
/// mandatory slots cannot fit in a day.
pub fn generate(request: &StudyRequest, rules: &RuleSet) -> Result<Plan> {
    rules.check()?;
    request.validate(rules)?;

    let budget = request.study_minutes_budget();
    let (blocks, leftover) = split_budget(budget, rules);
    debug!(
        budget,
        blocks = blocks.len(),
        leftover,
        days = request.days,
        "generating study plan"
    );

    let subjects: Vec<&str> = request.subjects.iter().map(|s| s.trim()).collect();
    // validate() guarantees 1..=max_days
    let day_count = request.days as u32;
    let days = (1..=day_count)
        .map(|day_index| lay_out_day(day_index, &subjects, &blocks, leftover, rules))
        .collect();

    Ok(Plan {
        meta: request.clone(),
        days,
    })
}

/// Split the daily budget into block lengths plus minutes too short to study.
fn split_budget(budget: u16, rules: &RuleSet) -> (Vec<u16>, u16) {
    let full = budget / rules.max_block_minutes;
    let remainder = budget % rules.max_block_minutes;

    let mut blocks = vec![rules.max_block_minutes; usize::from(full)];
    if remainder == 0 {
        (blocks, 0)
    } else if remainder >= rules.min_block_minutes {
        blocks.push(remainder);
        (blocks, 0)
    } else {
        (blocks, remainder)
    }
}

fn lay_out_day(
    day_index: u32,
    subjects: &[&str],
    blocks: &[u16],
    leftover: u16,
    rules: &RuleSet,
) -> DaySchedule {
    // Try the full day first, then shed trailing blocks until nothing runs
    // past midnight. With no blocks and no leftover only the mandatory slots
    // remain, and RuleSet::check() has already proven those fit.
    let candidates = (0..=blocks.len())
        .rev()
        .flat_map(|n| [(n, leftover), (n, 0)]);

    for (count, extra_free) in candidates {
        let items = sequence_day(day_index, subjects, &blocks[..count], extra_free, rules);
        if let Some(slots) = place(items, rules.day_start) {
            if count < blocks.len() {
                warn!(
                    day_index,
                    dropped = blocks.len() - count,
                    "study blocks clipped to keep the day before midnight"
                );
            }
            return DaySchedule { day_index, slots };
        }
    }

    DaySchedule {
        day_index,
        slots: Vec::new(),
    }
}

type Item = (SlotLabel, u16, Option<String>);

fn sequence_day(
    day_index: u32,
    subjects: &[&str],
    blocks: &[u16],
    extra_free: u16,
    rules: &RuleSet,
) -> Vec<Item> {
    let rest = |kind: BreakKind| (SlotLabel::Break(kind), rules.fixed_minutes(kind), None);
    let offset = (day_index as usize - 1) % subjects.len();
    let lunch_after = (blocks.len() + 1) / 2;
    let lunch_is_long_rest = rules.lunch_minutes >= rules.long_break.min_minutes;

    let mut items = Vec::with_capacity(blocks.len() * 2 + 4);
    items.push(rest(BreakKind::Breakfast));
    if blocks.is_empty() {
        items.push(rest(BreakKind::Lunch));
    }

    let mut run = 0u16;
    for (i, &minutes) in blocks.iter().enumerate() {
        let subject = subjects[(i + offset) % subjects.len()];
        let topic = (!rules.topics.is_empty())
            .then(|| rules.topics[(i + day_index as usize - 1) % rules.topics.len()].clone());
        items.push((SlotLabel::Subject(subject.to_string()), minutes, topic));
        run += 1;

        if i + 1 < blocks.len() {
            if run >= rules.long_break_every {
                items.push(rest(BreakKind::LongBreak));
                run = 0;
            } else {
                items.push(rest(BreakKind::MicroBreak));
            }
        }
        if i + 1 == lunch_after {
            items.push(rest(BreakKind::Lunch));
            if lunch_is_long_rest {
                run = 0;
            }
        }
    }

    items.push(rest(BreakKind::Dinner));
    let (label, minutes, topic) = rest(BreakKind::FreeTime);
    items.push((label, minutes.saturating_add(extra_free), topic));
    items
}

/// Assign sequential times from `anchor`; `None` if the day passes 24:00.
fn place(items: Vec<Item>, anchor: TimeOfDay) -> Option<Vec<Slot>> {
    let mut cursor = anchor;
    items
        .into_iter()
        .map(|(label, minutes, topic)| {
            let start = cursor;
            let end = start.checked_add(minutes)?;
            cursor = end;
            Some(Slot {
                start,
                end,
                label,
                topic,
            })
        })
        .collect()
}
