use clap::Subcommand;
use timora_core::Config;

use super::sync::SyncSession;
use super::{runtime, CmdResult};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a config value
    Get {
        /// Config key (e.g. "timer.focus_minutes", "planner.day_start")
        key: String,
    },
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// New value
        value: String,
    },
    /// List all config values
    List,
    /// Reset config to defaults
    Reset,
}

pub fn run(action: ConfigAction) -> CmdResult {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            match config.get(&key) {
                Some(value) => println!("{value}"),
                None => return Err(format!("unknown key: {key}").into()),
            }
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            if key.starts_with("timer.") {
                store_timer_settings(&config)?;
            }
            println!("ok");
        }
        ConfigAction::List => {
            let config = Config::load()?;
            for (key, value) in config.entries() {
                println!("{key} = {value}");
            }
        }
        ConfigAction::Reset => {
            let config = Config::default();
            config.save()?;
            store_timer_settings(&config)?;
            println!("config reset to defaults");
        }
    }
    Ok(())
}

/// Timer settings are part of the user record, so they sync like progress.
fn store_timer_settings(config: &Config) -> CmdResult {
    runtime()?.block_on(push_timer_settings(config))
}

async fn push_timer_settings(config: &Config) -> CmdResult {
    let session = SyncSession::open(config).await?;
    session.handle.with(|c| c.update_settings(config.timer.settings()));
    session.finish().await?;
    Ok(())
}
