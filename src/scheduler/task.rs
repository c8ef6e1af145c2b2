//! Scheduled Task
//!
//! Interval-driven background task with an overlap guard. Each tick runs
//! the body in its own task; if a tick fires while the previous body is
//! still running, the tick is skipped and logged, never queued. Skew is
//! allowed, overlap is not.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

/// Clears the running flag when the body finishes, even by panicking,
/// so one bad cycle cannot wedge the schedule.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

// == Scheduled Task ==
/// Handle to a spawned periodic task.
#[derive(Debug)]
pub struct ScheduledTask {
    name: &'static str,
    handle: JoinHandle<()>,
    skipped: Arc<AtomicU64>,
}

impl ScheduledTask {
    // == Spawn ==
    /// Spawns a periodic task named `name` firing every `period`.
    ///
    /// The body factory is called once per accepted tick and the resulting
    /// future runs on its own task, so a slow body cannot delay the clock;
    /// the `running` flag is what prevents two bodies from overlapping.
    pub fn spawn<F, Fut>(name: &'static str, period: Duration, body: F) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(false));
        let skipped = Arc::new(AtomicU64::new(0));
        let skipped_in_loop = skipped.clone();

        let handle = tokio::spawn(async move {
            debug!(task = name, period_ms = period.as_millis() as u64, "task started");
            let mut ticker = interval(period);
            // The first tick of a tokio interval fires immediately; delay
            // it so a freshly started scheduler waits one full period.
            ticker.reset();
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;

                if running
                    .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                    .is_err()
                {
                    skipped_in_loop.fetch_add(1, Ordering::SeqCst);
                    warn!(task = name, "previous run still in progress, skipping tick");
                    continue;
                }

                let fut = body();
                let guard = RunningGuard(running.clone());
                tokio::spawn(async move {
                    let _guard = guard;
                    fut.await;
                });
            }
        });

        Self {
            name,
            handle,
            skipped,
        }
    }

    /// Task name, for logging at shutdown.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// How many ticks the overlap guard has skipped.
    pub fn skipped_ticks(&self) -> u64 {
        self.skipped.load(Ordering::SeqCst)
    }

    // == Stop ==
    /// Stops the interval loop. A body already in flight runs to
    /// completion; only the ticking stops.
    pub fn stop(&self) {
        self.handle.abort();
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::sleep;

    #[tokio::test(start_paused = true)]
    async fn test_ticks_fire_at_interval() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();

        let task = ScheduledTask::spawn("counter", Duration::from_secs(10), move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
        });

        sleep(Duration::from_secs(35)).await;
        task.stop();

        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(task.skipped_ticks(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_body_skips_ticks_instead_of_queueing() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();

        // Body takes 2.5 periods; every other tick (and the one after)
        // must be skipped, not queued.
        let task = ScheduledTask::spawn("slow", Duration::from_secs(10), move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                sleep(Duration::from_secs(25)).await;
            }
        });

        sleep(Duration::from_secs(100)).await;
        task.stop();

        let runs = count.load(Ordering::SeqCst);
        assert!(
            (3..=4).contains(&runs),
            "expected roughly one run per 30s window, got {}",
            runs
        );
        assert!(task.skipped_ticks() >= 4, "skipped {} ticks", task.skipped_ticks());
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_body_does_not_wedge_the_schedule() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();

        let task = ScheduledTask::spawn("flaky", Duration::from_secs(10), move || {
            let c = c.clone();
            async move {
                let run = c.fetch_add(1, Ordering::SeqCst);
                if run == 0 {
                    panic!("first run blows up");
                }
            }
        });

        sleep(Duration::from_secs(35)).await;
        task.stop();

        assert_eq!(
            count.load(Ordering::SeqCst),
            3,
            "ticks after the panic must still run"
        );
        assert_eq!(task.skipped_ticks(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_ticking() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();

        let task = ScheduledTask::spawn("stoppable", Duration::from_secs(5), move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
        });

        sleep(Duration::from_secs(12)).await;
        task.stop();
        let after_stop = count.load(Ordering::SeqCst);

        sleep(Duration::from_secs(60)).await;
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
    }
}
