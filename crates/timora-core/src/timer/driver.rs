//! One-second tick source for a shared [`SessionTimer`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::debug;

use super::engine::SessionTimer;
use crate::events::Event;

pub const TICK: Duration = Duration::from_secs(1);

/// A timer shared between the tick task and whoever issues commands.
///
/// Ticks and commands take the same lock, so a `pause()` or `reset()` that
/// returns before a tick is processed always wins over that tick.
#[derive(Debug, Clone, Default)]
pub struct SharedTimer(Arc<Mutex<SessionTimer>>);

impl SharedTimer {
    pub fn new(timer: SessionTimer) -> Self {
        Self(Arc::new(Mutex::new(timer)))
    }

    pub fn lock(&self) -> MutexGuard<'_, SessionTimer> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against the timer under the lock.
    pub fn with<R>(&self, f: impl FnOnce(&mut SessionTimer) -> R) -> R {
        f(&mut self.lock())
    }
}

/// Background task calling `tick()` every `period`.
pub struct Ticker {
    handle: JoinHandle<()>,
    stop: Option<oneshot::Sender<()>>,
}

impl Ticker {
    /// Spawn the tick loop. Every event a tick produces is sent on `events`;
    /// the loop ends when stopped or when the receiver is dropped.
    pub fn spawn(timer: SharedTimer, period: Duration, events: mpsc::UnboundedSender<Event>) -> Self {
        let (stop_tx, mut stop_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await; // skip first immediate tick

            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = interval.tick() => {
                        let event = timer.with(SessionTimer::tick);
                        if let Some(event) = event {
                            if events.send(event).is_err() {
                                break;
                            }
                        }
                    }
                }
            }
            debug!("ticker loop ended");
        });

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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::{TimerMode, TimerSettings};

    fn one_minute_focus() -> SharedTimer {
        SharedTimer::new(SessionTimer::new(TimerSettings {
            focus_minutes: 1,
            ..TimerSettings::default()
        }))
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_completes_one_session() {
        let timer = one_minute_focus();
        timer.with(SessionTimer::start);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let ticker = Ticker::spawn(timer.clone(), TICK, tx);

        let event = time::timeout(Duration::from_secs(120), rx.recv())
            .await
            .unwrap()
            .unwrap();
        let done = event.as_completion().unwrap();
        assert_eq!(done.mode, TimerMode::Focus);

        // The timer stopped itself; nothing else arrives.
        assert!(time::timeout(Duration::from_secs(600), rx.recv()).await.is_err());
        assert_eq!(timer.lock().mode(), TimerMode::ShortBreak);
        ticker.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn pause_before_zero_cancels_completion() {
        let timer = one_minute_focus();
        timer.with(SessionTimer::start);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let ticker = Ticker::spawn(timer.clone(), TICK, tx);

        time::sleep(Duration::from_millis(30_500)).await;
        timer.with(SessionTimer::pause);
        let left = timer.lock().remaining_secs();
        assert!(left > 0 && left < 60);

        assert!(time::timeout(Duration::from_secs(600), rx.recv()).await.is_err());
        assert_eq!(timer.lock().remaining_secs(), left);
        ticker.stop().await;
    }
}
