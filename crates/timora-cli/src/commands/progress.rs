use clap::Subcommand;
use timora_core::Config;

use super::sync::SyncSession;
use super::{print_json, runtime, CmdResult};

#[derive(Subcommand)]
pub enum ProgressAction {
    /// Print coins, focus hours and streak as JSON
    Show,
    /// Zero all progress
    Reset,
}

pub fn run(action: ProgressAction) -> CmdResult {
    let config = Config::load()?;
    runtime()?.block_on(run_async(action, &config))
}

async fn run_async(action: ProgressAction, config: &Config) -> CmdResult {
    let session = SyncSession::open(config).await?;
    match action {
        ProgressAction::Show => {
            let progress = session.handle.lock().local().progress.clone();
            print_json(&progress)
        }
        ProgressAction::Reset => {
            session.handle.with(|c| c.reset_progress());
            let progress = session.handle.lock().local().progress.clone();
            session.finish().await?;
            print_json(&progress)
        }
    }
}
