//! # Timora Core Library
//!
//! Business logic for Timora, a study planner paired with a focus timer.
//! Everything is usable from the standalone `timora-cli` binary.
//!
//! ## Architecture
//!
//! - **Planner**: deterministic multi-day study plans built from a
//!   declarative [`RuleSet`], with an optional remote optimizer whose plans
//!   are validated before use
//! - **Timer**: a tick-driven focus/break state machine that reports each
//!   completed session exactly once
//! - **Rewards**: coins, focus hours and the daily streak, applied per
//!   completion
//! - **Sync**: a coordinator that keeps the user record consistent with an
//!   external store without letting stale snapshots undo local progress
//! - **Storage**: SQLite for sessions and the user record, TOML for
//!   configuration
//!
//! ## Key Components
//!
//! - [`generate`]: Plan generation
//! - [`SessionTimer`]: Timer state machine
//! - [`RewardLedger`]: Reward application
//! - [`SyncCoordinator`]: Sync bookkeeping
//! - [`Database`]: Session and record persistence
//! - [`Config`]: Application configuration management

pub mod error;
pub mod events;
pub mod planner;
pub mod reward;
pub mod rules;
pub mod storage;
pub mod sync;
pub mod timer;

pub use error::{ConfigError, CoreError, DatabaseError, PersistenceFailure, RuleViolation, ValidationError};
pub use events::{Event, SessionCompletion};
pub use planner::{generate, validate, Plan, Slot, StudyRequest};
pub use reward::{RewardLedger, StreakPolicy, UserProgress};
pub use rules::RuleSet;
pub use storage::{Config, Database};
pub use sync::{ProgressStore, SyncCoordinator, SyncHandle, UserRecord};
pub use timer::{SessionTimer, TimerMode, TimerSettings};
