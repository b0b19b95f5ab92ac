//! Time source and cancellation used by the polling loop.
//!
//! The engine never calls `Instant::now` or `thread::sleep` directly; it goes
//! through a [`Clock`] so that tests can run the time-out logic against
//! [`ManualClock`] without real elapsed time.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::warn;

/// Monotonic time source with a blocking sleep.
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Wall clock backed by [`Instant`] and [`std::thread::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Virtual clock: `sleep` advances time instantly.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    offset: Cell<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Cell::new(Duration::ZERO),
        }
    }

    /// Virtual time elapsed since creation.
    pub fn elapsed(&self) -> Duration {
        self.offset.get()
    }

    pub fn advance(&self, duration: Duration) {
        self.offset.set(self.offset.get() + duration);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.offset.get()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

impl<C: Clock> Clock for &C {
    fn now(&self) -> Instant {
        (*self).now()
    }

    fn sleep(&self, duration: Duration) {
        (*self).sleep(duration)
    }
}

/// Shared interrupt flag.
///
/// Clones observe the same flag, so a signal handler on another thread can
/// abort an exchange that is waiting for a reply.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Clear the flag so the connection can be used again.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    /// Raise the flag whenever the process receives Ctrl-C.
    ///
    /// Spawns a thread running a single-threaded tokio runtime that waits
    /// on the signal. The default "terminate on SIGINT" behaviour is
    /// replaced, so callers must poll [`is_cancelled`](Self::is_cancelled).
    pub fn cancel_on_ctrl_c(&self) -> std::io::Result<()> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let token = self.clone();
        std::thread::Builder::new()
            .name("ctrl-c".to_string())
            .spawn(move || {
                runtime.block_on(async move {
                    while tokio::signal::ctrl_c().await.is_ok() {
                        warn!("Interrupt received, cancelling");
                        token.cancel();
                    }
                });
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_sleep_advances_time() {
        let clock = ManualClock::new();
        let start = clock.now();
        clock.sleep(Duration::from_millis(250));
        assert_eq!(clock.now() - start, Duration::from_millis(250));
        assert_eq!(clock.elapsed(), Duration::from_millis(250));
    }

    #[test]
    fn test_cancel_token_is_shared_between_clones() {
        let token = CancelToken::new();
        let handle = token.clone();
        assert!(!token.is_cancelled());
        handle.cancel();
        assert!(token.is_cancelled());
        token.reset();
        assert!(!handle.is_cancelled());
    }
}
