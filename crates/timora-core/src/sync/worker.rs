//! Async driver moving writes and snapshots between a [`SyncCoordinator`]
//! and a [`ProgressStore`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Notify};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, warn};

use super::coordinator::{FailureAction, SyncCoordinator};
use super::store::ProgressStore;
use super::types::{RemoteSnapshot, Revision, SyncStatus};
use crate::error::PersistenceFailure;

/// Shared access to a coordinator. Every change made through
/// [`SyncHandle::with`] wakes the worker.
#[derive(Debug, Clone)]
pub struct SyncHandle {
    inner: Arc<Mutex<SyncCoordinator>>,
    wake: Arc<Notify>,
}

impl SyncHandle {
    pub fn new(coordinator: SyncCoordinator) -> Self {
        Self {
            inner: Arc::new(Mutex::new(coordinator)),
            wake: Arc::new(Notify::new()),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, SyncCoordinator> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against the coordinator, then wake the worker.
    pub fn with<R>(&self, f: impl FnOnce(&mut SyncCoordinator) -> R) -> R {
        let out = f(&mut self.lock());
        self.wake.notify_one();
        out
    }

    pub fn status(&self) -> SyncStatus {
        self.lock().status()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlushOutcome {
    /// Nothing to send.
    Idle,
    /// Another caller's write is still out.
    Busy,
    Acked { seq: u64, revision: Revision },
    RetryAfter(Duration),
    Stalled(PersistenceFailure),
}

/// Send at most one pending write and feed the reply back.
pub async fn flush_once<S: ProgressStore + ?Sized>(sync: &SyncHandle, store: &S) -> FlushOutcome {
    let request = sync.lock().next_write();
    let Some(request) = request else {
        let coordinator = sync.lock();
        if coordinator.status().in_flight {
            return FlushOutcome::Busy;
        }
        return match coordinator.stalled_by() {
            Some(failure) if coordinator.envelope().pending_write => FlushOutcome::Stalled(failure.clone()),
            _ => FlushOutcome::Idle,
        };
    };

    let result = store.write(&request.record).await;
    let mut coordinator = sync.lock();
    match result {
        Ok(revision) => {
            coordinator.on_write_ok(request.seq, revision);
            FlushOutcome::Acked {
                seq: request.seq,
                revision,
            }
        }
        Err(failure) => match coordinator.on_write_failed(request.seq, failure) {
            FailureAction::RetryAfter(delay) => FlushOutcome::RetryAfter(delay),
            FailureAction::Stalled(failure) => FlushOutcome::Stalled(failure),
        },
    }
}

/// Flush until nothing is pending, sleeping through retries.
///
/// # Errors
/// Returns the failure that stalled the coordinator, or `Unavailable` when
/// another write is already in flight.
pub async fn flush_until_settled<S: ProgressStore + ?Sized>(
    sync: &SyncHandle,
    store: &S,
) -> Result<(), PersistenceFailure> {
    loop {
        match flush_once(sync, store).await {
            FlushOutcome::Idle => return Ok(()),
            FlushOutcome::Acked { .. } => {}
            FlushOutcome::Busy => {
                return Err(PersistenceFailure::Unavailable("another write is in flight".into()));
            }
            FlushOutcome::RetryAfter(delay) => time::sleep(delay).await,
            FlushOutcome::Stalled(failure) => return Err(failure),
        }
    }
}

/// Pull the store's current record into the coordinator.
pub async fn pull<S: ProgressStore + ?Sized>(sync: &SyncHandle, store: &S) -> Result<(), PersistenceFailure> {
    if let Some(snapshot) = store.fetch().await? {
        let outcome = sync.lock().on_remote(snapshot);
        debug!(?outcome, "initial snapshot");
    }
    Ok(())
}

/// Background task owning the store side of a [`SyncHandle`].
///
/// It pulls once on start, then writes whenever the coordinator has
/// something pending, retries on the coordinator's schedule and feeds
/// snapshots from the subscription channel. Writes run on their own task so
/// snapshots keep arriving while one is in flight. A write still out at
/// `stop()` is left to finish on its own and requeued in the coordinator, so
/// the next flush sends the record again.
pub struct SyncWorker {
    handle: JoinHandle<()>,
    stop: Option<oneshot::Sender<()>>,
}

impl SyncWorker {
    pub fn spawn<S>(sync: SyncHandle, store: S, snapshots: mpsc::Receiver<RemoteSnapshot>) -> Self
    where
        S: ProgressStore + 'static,
    {
        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(run(sync, Arc::new(store), snapshots, stop_rx));
        Self {
            handle,
            stop: Some(stop_tx),
        }
    }

    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        let _ = self.handle.await;
    }
}

type InFlight = Option<(u64, JoinHandle<Result<Revision, PersistenceFailure>>)>;

/// Wait for the in-flight write, or forever if there is none.
async fn join_write(slot: &mut InFlight) -> (u64, Result<Revision, PersistenceFailure>) {
    match slot {
        Some((seq, task)) => {
            let result = match task.await {
                Ok(result) => result,
                Err(e) => Err(PersistenceFailure::Unavailable(format!("write task failed: {e}"))),
            };
            (*seq, result)
        }
        None => std::future::pending().await,
    }
}

async fn run<S: ProgressStore + 'static>(
    sync: SyncHandle,
    store: Arc<S>,
    mut snapshots: mpsc::Receiver<RemoteSnapshot>,
    mut stop: oneshot::Receiver<()>,
) {
    if let Err(e) = pull(&sync, &*store).await {
        warn!("initial fetch failed: {e}");
    }

    let mut in_flight: InFlight = None;
    let mut retry_at: Option<Instant> = None;
    let mut subscribed = true;

    loop {
        if in_flight.is_none() && retry_at.is_none() {
            let request = sync.lock().next_write();
            if let Some(request) = request {
                let store = Arc::clone(&store);
                let task = tokio::spawn(async move { store.write(&request.record).await });
                in_flight = Some((request.seq, task));
            }
        }

        let retry_deadline = retry_at.unwrap_or_else(Instant::now);
        tokio::select! {
            _ = &mut stop => break,
            _ = sync.wake.notified() => {}
            (seq, result) = join_write(&mut in_flight) => {
                in_flight = None;
                let mut coordinator = sync.lock();
                match result {
                    Ok(revision) => {
                        coordinator.on_write_ok(seq, revision);
                    }
                    Err(failure) => {
                        if let FailureAction::RetryAfter(delay) = coordinator.on_write_failed(seq, failure) {
                            retry_at = Some(Instant::now() + delay);
                        }
                    }
                }
            }
            snapshot = snapshots.recv(), if subscribed => match snapshot {
                Some(snapshot) => {
                    sync.lock().on_remote(snapshot);
                }
                None => {
                    debug!("snapshot subscription closed");
                    subscribed = false;
                }
            },
            _ = time::sleep_until(retry_deadline), if retry_at.is_some() => {
                retry_at = None;
            }
        }
    }
    if let Some((seq, _write)) = in_flight.take() {
        sync.lock().abandon_write(seq);
    }
    debug!("sync worker ended");
}
