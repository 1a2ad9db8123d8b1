//! Property tests for plan generation.

use proptest::prelude::*;
use timora_core::planner::{generate, validate, BreakKind, StudyRequest};
use timora_core::RuleSet;

fn request_strategy() -> impl Strategy<Value = StudyRequest> {
    (
        prop::collection::vec("[A-Za-z]{1,8}", 1..5),
        1u32..=120,
        1i64..=7,
    )
        .prop_map(|(subjects, tenths, days)| {
            StudyRequest::new(subjects, f64::from(tenths) / 10.0, days, "exam")
        })
}

proptest! {
    #[test]
    fn generation_is_deterministic(req in request_strategy()) {
        let rules = RuleSet::default();
        prop_assert_eq!(generate(&req, &rules).unwrap(), generate(&req, &rules).unwrap());
    }

    #[test]
    fn generated_plans_satisfy_the_rules(req in request_strategy()) {
        let rules = RuleSet::default();
        let plan = generate(&req, &rules).unwrap();
        let cap = u32::from(req.study_minutes_budget());

        prop_assert_eq!(plan.days.len() as i64, req.days);
        for day in &plan.days {
            prop_assert!(day.study_minutes() <= cap);
            prop_assert!(day.study_blocks().all(|s| s.duration_minutes() <= 60));
            for kind in BreakKind::MANDATORY {
                prop_assert_eq!(day.count(kind), 1);
            }
            for pair in day.slots.windows(2) {
                prop_assert!(pair[0].start < pair[0].end);
                prop_assert!(pair[0].end <= pair[1].start);
            }
        }
        prop_assert_eq!(validate(&plan, &req, &rules), Ok(()));
    }
}

#[test]
fn math_and_physics_for_one_exam_day() {
    let req = StudyRequest::new(["Math", "Physics"], 3.0, 1, "exam");
    let plan = generate(&req, &RuleSet::default()).unwrap();
    let day = &plan.days[0];

    let subjects: Vec<_> = day.study_blocks().filter_map(|s| s.subject()).collect();
    assert_eq!(subjects, ["Math", "Physics", "Math"]);
    assert_eq!(day.count(BreakKind::MicroBreak), 2);
    assert_eq!(day.count(BreakKind::LongBreak), 0);
    assert_eq!(plan.minutes_by_subject(), [("Math".to_string(), 120), ("Physics".to_string(), 60)]);
}

#[test]
fn invalid_requests_are_rejected_before_generation() {
    let rules = RuleSet::default();
    assert!(generate(&StudyRequest::new(Vec::<String>::new(), 3.0, 1, ""), &rules).is_err());
    assert!(generate(&StudyRequest::new(["Math"], 0.0, 1, ""), &rules).is_err());
    assert!(generate(&StudyRequest::new(["Math"], 3.0, 0, ""), &rules).is_err());
}
