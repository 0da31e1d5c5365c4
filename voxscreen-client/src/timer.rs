//! Owned periodic timers
//!
//! A [`ScopedTicker`] is the only handle to its background task. Stopping or
//! dropping the handle cancels the task, so a timer cannot outlive the
//! component that started it.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Simulated upload progress step
pub const PROGRESS_STEP: u8 = 7;
/// Simulated upload progress period
pub const PROGRESS_PERIOD: Duration = Duration::from_millis(60);

/// Returned by a tick callback to keep or end the timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickControl {
    Continue,
    Stop,
}

/// Periodic callback running on the tokio runtime
///
/// The first tick fires one `period` after spawning. The callback receives
/// the 1-based tick count.
#[derive(Debug)]
pub struct ScopedTicker {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ScopedTicker {
    /// Must be called from within a tokio runtime
    pub fn spawn<F>(period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut(u64) -> TickControl + Send + 'static,
    {
        let token = CancellationToken::new();
        let task_token = token.clone();

        let handle = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut ticks = 0u64;

            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = interval.tick() => {
                        ticks += 1;
                        if on_tick(ticks) == TickControl::Stop {
                            break;
                        }
                    }
                }
            }

            // Marks the ticker finished for `is_running` / `finished`
            task_token.cancel();
        });

        Self {
            token,
            handle: Some(handle),
        }
    }

    /// False once stopped, dropped or ended by its callback
    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Resolves when the ticker has ended for any reason
    pub async fn finished(&self) {
        self.token.cancelled().await
    }

    pub fn stop(&mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for ScopedTicker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Cosmetic progress shown while an audio upload is in flight
///
/// Climbs by [`PROGRESS_STEP`] every [`PROGRESS_PERIOD`] up to 100. It does
/// not reflect bytes sent.
#[derive(Debug)]
pub struct UploadProgress {
    percent: Arc<AtomicU8>,
    ticker: ScopedTicker,
}

impl UploadProgress {
    /// Start from 0 and report into `percent`
    pub fn start(percent: Arc<AtomicU8>) -> Self {
        percent.store(0, Ordering::Release);
        let shared = Arc::clone(&percent);

        let ticker = ScopedTicker::spawn(PROGRESS_PERIOD, move |_| {
            let current = shared.load(Ordering::Acquire);
            let next = current.saturating_add(PROGRESS_STEP).min(100);
            shared.store(next, Ordering::Release);
            if next >= 100 {
                TickControl::Stop
            } else {
                TickControl::Continue
            }
        });

        Self { percent, ticker }
    }

    pub fn percent(&self) -> u8 {
        self.percent.load(Ordering::Acquire)
    }

    /// Request settled: stop the timer and show completion
    pub fn finish(mut self) {
        self.ticker.stop();
        self.percent.store(100, Ordering::Release);
    }
}
