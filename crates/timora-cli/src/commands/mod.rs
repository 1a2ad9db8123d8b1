pub mod config;
pub mod plan;
pub mod progress;
pub mod stats;
pub mod sync;
pub mod timer;

use serde::Serialize;

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

pub(crate) fn print_json<T: Serialize>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Single-threaded runtime for commands that talk to the optimizer, the
/// progress store or the ticker.
pub(crate) fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}
