//! Reconciles local progress with the externally persisted record.
//!
//! Local writes win until the store acknowledges them. Every local mutation
//! marks the envelope pending and queues a write of the full record. A remote
//! snapshot is applied wholesale only while nothing is pending; otherwise the
//! newest one is held and looked at again once the latest write is
//! acknowledged, at which point it is applied only if the store has moved on
//! past that write.
//!
//! The coordinator does no I/O. [`worker`](super::worker) moves requests and
//! replies between it and a [`ProgressStore`](super::ProgressStore).

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, warn};

use super::retry::RetryPolicy;
use super::types::{
    RemoteSnapshot, Revision, SyncEnvelope, SyncState, SyncStatus, UserRecord, WriteRequest,
};
use crate::error::PersistenceFailure;
use crate::events::SessionCompletion;
use crate::reward::{RewardLedger, StreakPolicy};
use crate::timer::{TimerMode, TimerSettings};

/// What happened to an incoming remote snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOutcome {
    Applied,
    /// Kept until the pending write is acknowledged.
    Held,
    /// Not newer than what was already seen.
    Ignored,
}

/// What to do after a failed write.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureAction {
    RetryAfter(Duration),
    /// Retrying stopped; the mutation stays local until `resume()`.
    Stalled(PersistenceFailure),
}

#[derive(Debug)]
pub struct SyncCoordinator {
    envelope: SyncEnvelope,
    retry: RetryPolicy,
    /// Sequence number of the newest local mutation.
    latest_seq: u64,
    in_flight: Option<u64>,
    held: Option<RemoteSnapshot>,
    attempts: u32,
    stalled: Option<PersistenceFailure>,
    last_error: Option<String>,
    last_ack_at: Option<DateTime<Utc>>,
}

impl SyncCoordinator {
    pub fn new(local: UserRecord, retry: RetryPolicy) -> Self {
        Self::from_envelope(SyncEnvelope::new(local), retry)
    }

    /// Rebuild from a persisted envelope. A write that was pending when the
    /// envelope was saved is queued again.
    pub fn from_envelope(envelope: SyncEnvelope, retry: RetryPolicy) -> Self {
        let latest_seq = u64::from(envelope.pending_write);
        Self {
            envelope,
            retry,
            latest_seq,
            in_flight: None,
            held: None,
            attempts: 0,
            stalled: None,
            last_error: None,
            last_ack_at: None,
        }
    }

    pub fn local(&self) -> &UserRecord {
        &self.envelope.local
    }

    pub fn envelope(&self) -> &SyncEnvelope {
        &self.envelope
    }

    pub fn status(&self) -> SyncStatus {
        let state = if self.stalled.is_some() {
            SyncState::Stalled
        } else if self.attempts > 0 {
            SyncState::Retrying
        } else if self.envelope.pending_write {
            SyncState::Pending
        } else {
            SyncState::Synced
        };
        SyncStatus {
            state,
            pending_write: self.envelope.pending_write,
            in_flight: self.in_flight.is_some(),
            held_snapshot: self.held.is_some(),
            remote_revision_seen: self.envelope.remote_revision_seen,
            attempts: self.attempts,
            last_error: self.last_error.clone(),
            last_ack_at: self.last_ack_at,
        }
    }

    // ── Local mutations ──────────────────────────────────────────────

    /// Change the local record. The change is visible immediately and a
    /// write of the whole record is queued.
    pub fn mutate<R>(&mut self, f: impl FnOnce(&mut UserRecord) -> R) -> R {
        let out = f(&mut self.envelope.local);
        self.envelope.pending_write = true;
        self.latest_seq += 1;
        debug!(seq = self.latest_seq, "local record changed");
        out
    }

    /// Reward a completed session once. Returns `false` if this completion
    /// was already rewarded, including before a restart.
    pub fn record_completion(
        &mut self,
        ledger: &RewardLedger,
        streak: &StreakPolicy,
        event: &SessionCompletion,
        today: NaiveDate,
    ) -> bool {
        if self.envelope.has_applied(&event.session_id) {
            debug!(session_id = %event.session_id, "completion already rewarded");
            return false;
        }
        self.envelope.remember(event.session_id);
        self.mutate(|record| {
            let mut progress = ledger.apply_completion(&record.progress, event);
            if event.mode == TimerMode::Focus {
                progress = streak.apply(&progress, today);
            }
            record.progress = progress;
        });
        true
    }

    pub fn update_settings(&mut self, settings: TimerSettings) {
        self.mutate(|record| record.settings = settings);
    }

    pub fn reset_progress(&mut self) {
        self.mutate(|record| record.progress.reset());
    }

    // ── Store traffic ────────────────────────────────────────────────

    /// The write to send now, if any. Only one write is in flight at a time
    /// and nothing is sent while stalled.
    pub fn next_write(&mut self) -> Option<WriteRequest> {
        if self.stalled.is_some() || self.in_flight.is_some() || !self.envelope.pending_write {
            return None;
        }
        self.in_flight = Some(self.latest_seq);
        Some(WriteRequest {
            seq: self.latest_seq,
            record: self.envelope.local.clone(),
        })
    }

    /// The store accepted write `seq` as `revision`.
    pub fn on_write_ok(&mut self, seq: u64, revision: Revision) -> Option<RemoteOutcome> {
        self.in_flight = None;
        self.attempts = 0;
        self.last_error = None;
        self.last_ack_at = Some(Utc::now());
        self.see(revision);

        if seq >= self.latest_seq {
            self.envelope.pending_write = false;
            info!(seq, %revision, "progress write acknowledged");
        } else {
            debug!(seq, latest = self.latest_seq, "superseded write acknowledged");
            return None;
        }

        let held = self.held.take()?;
        let outcome = self.on_remote(held);
        debug!(?outcome, "held snapshot re-evaluated");
        Some(outcome)
    }

    /// Write `seq` failed. Local state is kept as is.
    pub fn on_write_failed(&mut self, seq: u64, failure: PersistenceFailure) -> FailureAction {
        self.in_flight = None;
        self.attempts += 1;
        self.last_error = Some(failure.to_string());

        if failure.is_retryable() && self.attempts < self.retry.max_attempts {
            let delay = self.retry.delay_for(self.attempts);
            warn!(
                seq,
                attempt = self.attempts,
                max_attempts = self.retry.max_attempts,
                delay_ms = delay.as_millis() as u64,
                "progress write failed, retrying: {failure}"
            );
            return FailureAction::RetryAfter(delay);
        }

        let failure = if failure.is_retryable() {
            PersistenceFailure::Exhausted {
                attempts: self.attempts,
                last_error: failure.to_string(),
            }
        } else {
            failure
        };
        warn!(seq, "progress sync stalled: {failure}");
        self.stalled = Some(failure.clone());
        FailureAction::Stalled(failure)
    }

    /// Write `seq` will not be reported back. It goes out again on the next
    /// `next_write`.
    pub fn abandon_write(&mut self, seq: u64) {
        if self.in_flight == Some(seq) {
            self.in_flight = None;
            debug!(seq, "in-flight write abandoned");
        }
    }

    /// The failure that stalled sync, while it stays stalled.
    pub fn stalled_by(&self) -> Option<&PersistenceFailure> {
        self.stalled.as_ref()
    }

    /// Leave the stalled state, typically when a connection comes back.
    /// Returns whether a write is waiting to go out.
    pub fn resume(&mut self) -> bool {
        if self.stalled.take().is_some() {
            info!("progress sync resumed");
        }
        self.attempts = 0;
        self.envelope.pending_write
    }

    /// A remote snapshot arrived.
    pub fn on_remote(&mut self, snapshot: RemoteSnapshot) -> RemoteOutcome {
        if self
            .envelope
            .remote_revision_seen
            .is_some_and(|seen| snapshot.revision <= seen)
        {
            debug!(revision = %snapshot.revision, "ignoring stale snapshot");
            return RemoteOutcome::Ignored;
        }

        if self.envelope.pending_write || self.in_flight.is_some() {
            let newer = self
                .held
                .as_ref()
                .map_or(true, |held| snapshot.revision > held.revision);
            if newer {
                debug!(revision = %snapshot.revision, "holding snapshot until write is acknowledged");
                self.held = Some(snapshot);
            }
            return RemoteOutcome::Held;
        }

        info!(revision = %snapshot.revision, "applying remote snapshot");
        self.see(snapshot.revision);
        self.envelope.local = snapshot.record;
        RemoteOutcome::Applied
    }

    fn see(&mut self, revision: Revision) {
        let seen = &mut self.envelope.remote_revision_seen;
        if seen.map_or(true, |s| revision > s) {
            *seen = Some(revision);
        }
    }
}
