//! Keeping the user record consistent with an external store.
//!
//! Every local change goes through a [`SyncCoordinator`], which owns the
//! authoritative local record and decides what to send and which remote
//! snapshots to believe. The [`SyncWorker`] moves data between the
//! coordinator and a [`ProgressStore`] off the timer's path.

mod coordinator;
mod retry;
mod store;
mod types;
pub mod worker;

pub use coordinator::{FailureAction, RemoteOutcome, SyncCoordinator};
pub use retry::RetryPolicy;
pub use store::{ProgressStore, SqliteProgressStore};
pub use types::{
    RemoteSnapshot, Revision, SyncEnvelope, SyncState, SyncStatus, UserRecord, WriteRequest,
    APPLIED_LOG_CAP,
};
pub use worker::{flush_once, flush_until_settled, pull, FlushOutcome, SyncHandle, SyncWorker};
