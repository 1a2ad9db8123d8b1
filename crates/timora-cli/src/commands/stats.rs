use clap::Subcommand;
use timora_core::storage::Database;

use super::{print_json, CmdResult};

#[derive(Subcommand)]
pub enum StatsAction {
    /// Today's stats
    Today,
    /// All-time stats
    All,
    /// Most recent completed sessions
    Recent {
        #[arg(long, default_value = "10")]
        limit: usize,
    },
}

pub fn run(action: StatsAction) -> CmdResult {
    let db = Database::open()?;

    match action {
        StatsAction::Today => print_json(&db.stats_today()?),
        StatsAction::All => print_json(&db.stats_all()?),
        StatsAction::Recent { limit } => print_json(&db.recent_sessions(limit)?),
    }
}
