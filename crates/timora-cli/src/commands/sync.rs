//! Sync subcommand and the session every record-changing command goes
//! through.
//!
//! The coordinator's envelope lives in the `kv` table between runs, so an
//! unacknowledged change from an earlier invocation is sent again.

use clap::Subcommand;
use timora_core::storage::Database;
use timora_core::sync::{
    flush_until_settled, pull, SqliteProgressStore, SyncCoordinator, SyncEnvelope, SyncHandle,
    SyncState, SyncStatus, UserRecord,
};
use timora_core::{Config, TimerSettings};
use tracing::warn;

use super::{print_json, runtime, CmdResult};

const ENVELOPE_KEY: &str = "sync_envelope";

#[derive(Subcommand)]
pub enum SyncAction {
    /// Show coordinator state
    Status,
    /// Push pending changes to the store
    Flush,
    /// Retry a stalled change
    Resume,
}

pub(crate) struct SyncSession {
    db: Database,
    store: SqliteProgressStore,
    /// An envelope was saved by an earlier run.
    resumed: bool,
    pub handle: SyncHandle,
}

impl SyncSession {
    pub async fn open(config: &Config) -> Result<Self, Box<dyn std::error::Error>> {
        let db = Database::open()?;
        let store = SqliteProgressStore::new(Database::open()?);
        let retry = config.sync.retry.clone();
        let envelope = db.kv_get_json::<SyncEnvelope>(ENVELOPE_KEY)?;
        let resumed = envelope.is_some();
        let coordinator = match envelope {
            Some(envelope) => SyncCoordinator::from_envelope(envelope, retry),
            None => SyncCoordinator::new(UserRecord::new_account(), retry),
        };
        let handle = SyncHandle::new(coordinator);
        if let Err(e) = pull(&handle, &store).await {
            warn!("could not read the stored record: {e}");
        }
        Ok(Self {
            db,
            store,
            resumed,
            handle,
        })
    }

    /// Timer settings from the user record, once this device has one.
    pub fn timer_settings(&self) -> Option<TimerSettings> {
        let coordinator = self.handle.lock();
        let known = self.resumed || coordinator.envelope().remote_revision_seen.is_some();
        known.then(|| coordinator.local().settings)
    }

    /// Send whatever is pending, then save the envelope. A failed send is
    /// not an error: the change stays local and is retried next time.
    pub async fn finish(self) -> Result<SyncStatus, Box<dyn std::error::Error>> {
        if let Err(failure) = flush_until_settled(&self.handle, &self.store).await {
            warn!(%failure, "change kept locally");
        }
        self.save()?;
        Ok(self.handle.status())
    }

    fn save(&self) -> CmdResult {
        self.db.kv_set_json(ENVELOPE_KEY, self.handle.lock().envelope())?;
        Ok(())
    }
}

pub fn run(action: SyncAction) -> CmdResult {
    let config = Config::load()?;
    runtime()?.block_on(run_async(action, &config))
}

async fn run_async(action: SyncAction, config: &Config) -> CmdResult {
    let session = SyncSession::open(config).await?;
    match action {
        SyncAction::Status => print_json(&session.handle.status()),
        SyncAction::Flush => report(session.finish().await?),
        SyncAction::Resume => {
            if !session.handle.with(SyncCoordinator::resume) {
                eprintln!("nothing to resume");
            }
            report(session.finish().await?)
        }
    }
}

fn report(status: SyncStatus) -> CmdResult {
    print_json(&status)?;
    if status.state == SyncState::Stalled {
        let reason = status.last_error.unwrap_or_else(|| "unknown failure".into());
        return Err(format!("sync stalled: {reason}").into());
    }
    Ok(())
}
