//! JSON interchange shape shared with renderers and the remote optimizer.
//!
//! ```json
//! {"meta": {"subjects": ["Math"], "hoursPerDay": 3, "days": 1, "goal": "exam"},
//!  "days": [{"day": 1, "slots": [{"time": "09:00 - 10:00", "subject": "Math", "topic": "Practice"}]}]}
//! ```

use serde::{Deserialize, Serialize};

use super::{BreakKind, DaySchedule, Plan, Slot, SlotLabel, StudyRequest, TimeOfDay};
use crate::error::RuleViolation;
use crate::rules::RuleSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WirePlan {
    pub meta: StudyRequest,
    pub days: Vec<WireDay>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireDay {
    pub day: u32,
    pub slots: Vec<WireSlot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireSlot {
    /// `"HH:MM - HH:MM"`
    pub time: String,
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

/// Optimizer responses come either bare or wrapped as `{"plan": ...}`,
/// with `{"plan": null}` meaning "no plan".
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum WireResponse {
    Bare(WirePlan),
    Wrapped { plan: Option<WirePlan> },
}

/// Parse an optimizer response body.
///
/// # Errors
/// Returns a JSON error when the body is neither shape.
pub fn parse_response(body: &str) -> Result<Option<WirePlan>, serde_json::Error> {
    Ok(match serde_json::from_str::<WireResponse>(body)? {
        WireResponse::Bare(plan) => Some(plan),
        WireResponse::Wrapped { plan } => plan,
    })
}

impl From<&Plan> for WirePlan {
    fn from(plan: &Plan) -> Self {
        WirePlan {
            meta: plan.meta.clone(),
            days: plan
                .days
                .iter()
                .map(|day| WireDay {
                    day: day.day_index,
                    slots: day
                        .slots
                        .iter()
                        .map(|slot| WireSlot {
                            time: format!("{} - {}", slot.start, slot.end),
                            subject: slot.display_label().to_string(),
                            topic: slot.topic.clone(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

impl WirePlan {
    /// Convert back into a [`Plan`] for `request`.
    ///
    /// The wire `meta` is not trusted; the result echoes `request`. Labels
    /// are classified but rules are not checked here, see
    /// [`validate`](super::validate).
    ///
    /// # Errors
    /// Returns [`RuleViolation::Malformed`] for unparseable times or labels
    /// that are neither a requested subject nor a known break.
    pub fn into_plan(self, request: &StudyRequest, rules: &RuleSet) -> Result<Plan, RuleViolation> {
        let days = self
            .days
            .into_iter()
            .map(|day| {
                let slots = day
                    .slots
                    .into_iter()
                    .map(|slot| parse_slot(slot, request, rules))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(DaySchedule {
                    day_index: day.day,
                    slots,
                })
            })
            .collect::<Result<Vec<_>, RuleViolation>>()?;

        Ok(Plan {
            meta: request.clone(),
            days,
        })
    }
}

fn parse_slot(slot: WireSlot, request: &StudyRequest, rules: &RuleSet) -> Result<Slot, RuleViolation> {
    let (start, end) = parse_range(&slot.time)?;
    let minutes = start.minutes_until(end);
    let label = classify(slot.subject.trim(), minutes, request, rules)?;
    let topic = match label {
        SlotLabel::Subject(_) => slot.topic,
        SlotLabel::Break(_) => None,
    };
    Ok(Slot {
        start,
        end,
        label,
        topic,
    })
}

fn parse_range(time: &str) -> Result<(TimeOfDay, TimeOfDay), RuleViolation> {
    let (start, end) = time
        .split_once('-')
        .or_else(|| time.split_once('–'))
        .ok_or_else(|| RuleViolation::Malformed(format!("bad time range '{time}'")))?;
    let parse = |s: &str| {
        s.parse::<TimeOfDay>()
            .map_err(|e| RuleViolation::Malformed(format!("bad time range '{time}': {e}")))
    };
    Ok((parse(start)?, parse(end)?))
}

fn classify(
    label: &str,
    minutes: u16,
    request: &StudyRequest,
    rules: &RuleSet,
) -> Result<SlotLabel, RuleViolation> {
    if let Some(subject) = request.subjects.iter().find(|s| s.trim() == label) {
        return Ok(SlotLabel::Subject(subject.trim().to_string()));
    }
    for kind in BreakKind::MANDATORY {
        if kind.label().eq_ignore_ascii_case(label) {
            return Ok(SlotLabel::Break(kind));
        }
    }
    if BreakKind::LongBreak.label().eq_ignore_ascii_case(label) {
        return Ok(SlotLabel::Break(BreakKind::LongBreak));
    }
    if rules.is_rest_label(label) {
        let kind = if minutes >= rules.long_break.min_minutes {
            BreakKind::LongBreak
        } else {
            BreakKind::MicroBreak
        };
        return Ok(SlotLabel::Break(kind));
    }
    Err(RuleViolation::Malformed(format!("unknown slot label '{label}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::generate;

    #[test]
    fn renders_time_ranges_and_break_names() {
        let req = StudyRequest::new(["Math", "Physics"], 3.0, 1, "exam");
        let plan = generate(&req, &RuleSet::default()).unwrap();
        let wire = WirePlan::from(&plan);
        let json = serde_json::to_value(&wire).unwrap();

        assert_eq!(json["meta"]["hoursPerDay"], 3.0);
        assert_eq!(json["days"][0]["day"], 1);
        assert_eq!(json["days"][0]["slots"][0]["time"], "09:00 - 09:30");
        assert_eq!(json["days"][0]["slots"][0]["subject"], "Breakfast");
        assert!(json["days"][0]["slots"][0].get("topic").is_none());
        assert_eq!(json["days"][0]["slots"][1]["subject"], "Math");
        assert_eq!(json["days"][0]["slots"][1]["topic"], "Practice");
    }

    #[test]
    fn converts_back_to_the_same_plan() {
        let rules = RuleSet::default();
        let req = StudyRequest::new(["Math", "Physics"], 6.5, 2, "exam");
        let plan = generate(&req, &rules).unwrap();
        let back = WirePlan::from(&plan).into_plan(&req, &rules).unwrap();
        assert_eq!(back, plan);
    }

    #[test]
    fn generic_rest_labels_classified_by_length() {
        let rules = RuleSet::default();
        let req = StudyRequest::new(["Math"], 1.0, 1, "");
        let wire = WirePlan {
            meta: req.clone(),
            days: vec![WireDay {
                day: 1,
                slots: vec![
                    WireSlot {
                        time: "10:00 - 10:15".into(),
                        subject: "Stretching".into(),
                        topic: None,
                    },
                    WireSlot {
                        time: "10:15-10:55".into(),
                        subject: "Nap".into(),
                        topic: Some("ignored".into()),
                    },
                ],
            }],
        };
        let plan = wire.into_plan(&req, &rules).unwrap();
        assert_eq!(plan.days[0].slots[0].break_kind(), Some(BreakKind::MicroBreak));
        assert_eq!(plan.days[0].slots[1].break_kind(), Some(BreakKind::LongBreak));
        assert_eq!(plan.days[0].slots[1].topic, None);
    }

    #[test]
    fn unknown_label_is_malformed() {
        let rules = RuleSet::default();
        let req = StudyRequest::new(["Math"], 1.0, 1, "");
        let wire = WirePlan {
            meta: req.clone(),
            days: vec![WireDay {
                day: 1,
                slots: vec![WireSlot {
                    time: "10:00 - 11:00".into(),
                    subject: "Algebra".into(),
                    topic: None,
                }],
            }],
        };
        assert!(matches!(
            wire.into_plan(&req, &rules),
            Err(RuleViolation::Malformed(_))
        ));
    }

    #[test]
    fn parses_wrapped_bare_and_null_responses() {
        let bare = r#"{"meta":{"subjects":["Math"],"hoursPerDay":1,"days":1,"goal":"x"},"days":[]}"#;
        assert!(parse_response(bare).unwrap().is_some());

        let wrapped = format!(r#"{{"plan":{bare}}}"#);
        assert!(parse_response(&wrapped).unwrap().is_some());

        assert!(parse_response(r#"{"plan":null}"#).unwrap().is_none());
        assert!(parse_response("[1,2]").is_err());
    }
}
