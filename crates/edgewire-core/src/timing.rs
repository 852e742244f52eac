// ── Timing primitives ──
//
// Two distinct rate limiters:
// - `Debounce` (trailing): the first trigger arms a timer, later triggers
//   inside the window are absorbed, the action runs once when it fires.
// - `Cooldown` (leading): the first attempt passes and opens a window,
//   attempts inside the window are dropped.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

// ── Debounce ────────────────────────────────────────────────────────

/// Trailing-edge debounce with an idle/armed state.
#[derive(Debug)]
pub struct Debounce {
    window: Duration,
    armed: Arc<AtomicBool>,
}

impl Debounce {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            armed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    /// Arm the timer unless it already is. When it fires, the debounce is
    /// disarmed first and then `action` runs, so triggers arriving while
    /// the action is in flight arm a fresh window.
    ///
    /// Returns `true` if this call armed the timer.
    pub fn trigger<F, Fut>(&self, action: F) -> bool
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.armed.swap(true, Ordering::AcqRel) {
            return false;
        }

        let armed = Arc::clone(&self.armed);
        let window = self.window;
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            armed.store(false, Ordering::Release);
            action().await;
        });
        true
    }
}

// ── Cooldown ────────────────────────────────────────────────────────

/// Leading-edge cooldown: at most one pass per period.
#[derive(Debug)]
pub struct Cooldown {
    period: Duration,
    last: Mutex<Option<Instant>>,
}

impl Cooldown {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            last: Mutex::new(None),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// `true` if outside the window; the window then restarts now.
    pub fn try_acquire(&self) -> bool {
        let now = Instant::now();
        let mut last = self.last.lock();
        match *last {
            Some(at) if now.duration_since(at) < self.period => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }

    pub fn is_cooling_down(&self) -> bool {
        self.last
            .lock()
            .is_some_and(|at| at.elapsed() < self.period)
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> usize) {
        let count = Arc::new(AtomicUsize::new(0));
        let read = {
            let count = Arc::clone(&count);
            move || count.load(Ordering::SeqCst)
        };
        (count, read)
    }

    fn bump(count: &Arc<AtomicUsize>) -> impl FnOnce() -> std::future::Ready<()> + Send + 'static {
        let count = Arc::clone(count);
        move || {
            count.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_runs_once_per_window() {
        let debounce = Debounce::new(Duration::from_millis(100));
        let (count, read) = counter();

        assert!(debounce.trigger(bump(&count)));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!debounce.trigger(bump(&count)));
        assert!(!debounce.trigger(bump(&count)));
        assert_eq!(read(), 0);

        tokio::time::sleep(Duration::from_millis(51)).await;
        assert_eq!(read(), 1);
        assert!(!debounce.is_armed());

        // Next trigger opens a fresh window.
        assert!(debounce.trigger(bump(&count)));
        tokio::time::sleep(Duration::from_millis(101)).await;
        assert_eq!(read(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_window_is_measured_from_first_trigger() {
        let debounce = Debounce::new(Duration::from_millis(100));
        let (count, read) = counter();

        debounce.trigger(bump(&count));
        tokio::time::sleep(Duration::from_millis(90)).await;
        debounce.trigger(bump(&count));
        tokio::time::sleep(Duration::from_millis(11)).await;
        // Trailing but not extended: fires 100ms after the first trigger.
        assert_eq!(read(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_passes_leading_attempt_only() {
        let cooldown = Cooldown::new(Duration::from_millis(1000));

        assert!(cooldown.try_acquire());
        assert!(cooldown.is_cooling_down());
        for _ in 0..5 {
            assert!(!cooldown.try_acquire());
        }

        tokio::time::advance(Duration::from_millis(999)).await;
        assert!(!cooldown.try_acquire());

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(!cooldown.is_cooling_down());
        assert!(cooldown.try_acquire());
    }
}
