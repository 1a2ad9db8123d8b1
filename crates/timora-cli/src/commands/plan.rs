use clap::Subcommand;
use timora_core::planner::wire::WirePlan;
use timora_core::planner::{generate, plan_with_fallback, OptimizerClient, Plan, StudyRequest};
use timora_core::storage::Database;
use timora_core::{Config, RuleSet};
use tracing::debug;

use super::{print_json, runtime, CmdResult};

#[derive(Subcommand)]
pub enum PlanAction {
    /// Generate a day-by-day study plan
    Generate {
        /// Subject to study (repeatable)
        #[arg(long = "subject", required = true)]
        subjects: Vec<String>,
        /// Study hours per day
        #[arg(long)]
        hours: f64,
        /// Number of days
        #[arg(long, allow_hyphen_values = true)]
        days: i64,
        /// Free-text goal
        #[arg(long, default_value = "")]
        goal: String,
        /// Print the `{"plan": ...}` exchange format instead
        #[arg(long)]
        wire: bool,
        /// Ask the remote optimizer first
        #[arg(long)]
        optimizer: bool,
    },
}

pub fn run(action: PlanAction) -> CmdResult {
    let PlanAction::Generate {
        subjects,
        hours,
        days,
        goal,
        wire,
        optimizer,
    } = action;

    let config = Config::load()?;
    let rules = config.planner.to_rules()?;
    let request = StudyRequest::new(subjects, hours, days, goal);

    let plan = if optimizer || config.planner.optimizer_enabled {
        let client = OptimizerClient::new(&config.planner.optimizer_url, config.planner.optimizer_timeout())?;
        let outcome = runtime()?.block_on(plan_with_fallback(&request, &rules, Some(&client)))?;
        if let Some(reason) = &outcome.fallback_reason {
            eprintln!("optimizer plan not used: {reason}");
        }
        debug!(source = ?outcome.source, "plan ready");
        outcome.plan
    } else {
        cached_or_generated(&request, &rules)?
    };

    if wire {
        print_json(&serde_json::json!({ "plan": WirePlan::from(&plan) }))
    } else {
        print_json(&plan)
    }
}

/// Equal requests under equal rules give equal plans, so the fingerprint is
/// a safe cache key.
fn cached_or_generated(request: &StudyRequest, rules: &RuleSet) -> Result<Plan, Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let fingerprint = request.fingerprint(rules);
    if let Some(plan) = db.cached_plan(&fingerprint)? {
        debug!(%fingerprint, "plan cache hit");
        return Ok(plan);
    }
    let plan = generate(request, rules)?;
    db.cache_plan(&fingerprint, &plan)?;
    Ok(plan)
}
