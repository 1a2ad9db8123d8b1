pub mod driver;
mod engine;
mod settings;

pub use driver::{SharedTimer, Ticker};
pub use engine::{Durations, RunState, SessionState, SessionTimer};
pub use settings::{TimerMode, TimerSettings};
