//! Core types for progress synchronization.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::reward::UserProgress;
use crate::timer::TimerSettings;

/// Ordered version stamp assigned by the store to every accepted write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(pub i64);

impl std::fmt::Display for Revision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// The persisted user record: progress counters plus timer settings.
///
/// ```json
/// {"coins": 10, "totalFocusHours": 0.0, "currentStreak": 0,
///  "settings": {"focusMinutes": 25, "shortBreakMinutes": 5, "longBreakMinutes": 15, "sessionsBeforeLongBreak": 4}}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(flatten)]
    pub progress: UserProgress,
    #[serde(default)]
    pub settings: TimerSettings,
}

impl UserRecord {
    pub fn new_account() -> Self {
        Self {
            progress: UserProgress::new_account(),
            settings: TimerSettings::default(),
        }
    }
}

/// A copy of the record as the store last saw it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteSnapshot {
    pub revision: Revision,
    pub record: UserRecord,
}

/// Most completion ids remembered for deduplication.
pub const APPLIED_LOG_CAP: usize = 256;

/// Sync bookkeeping that survives restarts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncEnvelope {
    pub local: UserRecord,
    #[serde(default)]
    pub remote_revision_seen: Option<Revision>,
    #[serde(default)]
    pub pending_write: bool,
    /// Completion ids already rewarded, oldest first.
    #[serde(default)]
    pub applied_sessions: VecDeque<Uuid>,
}

impl SyncEnvelope {
    pub fn new(local: UserRecord) -> Self {
        Self {
            local,
            ..Self::default()
        }
    }

    pub fn has_applied(&self, id: &Uuid) -> bool {
        self.applied_sessions.contains(id)
    }

    pub(crate) fn remember(&mut self, id: Uuid) {
        if self.applied_sessions.len() == APPLIED_LOG_CAP {
            self.applied_sessions.pop_front();
        }
        self.applied_sessions.push_back(id);
    }
}

/// A full-record write handed to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    /// Increases with every local mutation; a later write supersedes an
    /// earlier one.
    pub seq: u64,
    pub record: UserRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Synced,
    Pending,
    Retrying,
    Stalled,
}

/// Current sync status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub state: SyncState,
    pub pending_write: bool,
    pub in_flight: bool,
    /// A remote snapshot is waiting for the pending write to be acknowledged.
    pub held_snapshot: bool,
    pub remote_revision_seen: Option<Revision>,
    /// Failed attempts since the last acknowledged write.
    pub attempts: u32,
    pub last_error: Option<String>,
    pub last_ack_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_matches_store_shape() {
        let json = serde_json::to_value(UserRecord::new_account()).unwrap();
        assert_eq!(json["coins"], 10);
        assert_eq!(json["totalFocusHours"], 0.0);
        assert_eq!(json["currentStreak"], 0);
        assert_eq!(json["settings"]["longBreakMinutes"], 15);
        assert!(json.get("progress").is_none());
    }

    #[test]
    fn record_without_settings_gets_defaults() {
        let record: UserRecord =
            serde_json::from_str(r#"{"coins": 3, "totalFocusHours": 1.5, "currentStreak": 2}"#)
                .unwrap();
        assert_eq!(record.progress.coins, 3);
        assert_eq!(record.settings, TimerSettings::default());
    }

    #[test]
    fn applied_log_is_bounded() {
        let mut envelope = SyncEnvelope::default();
        let first = Uuid::new_v4();
        envelope.remember(first);
        for _ in 0..APPLIED_LOG_CAP {
            envelope.remember(Uuid::new_v4());
        }
        assert_eq!(envelope.applied_sessions.len(), APPLIED_LOG_CAP);
        assert!(!envelope.has_applied(&first));
    }
}
