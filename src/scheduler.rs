//! Recurring poll timer, one per notification domain.
//!
//! The scheduler is either `Stopped` or `Running`. Starting while running and
//! stopping while stopped are both no-ops, so any number of mounted
//! consumers can call `start` without multiplying timers. Each tick awaits
//! the target to completion before the next one is scheduled, and a late
//! tick pushes the following one a full interval out.

use async_trait::async_trait;
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, Weak,
    },
    time::Duration,
};
use tokio::{
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Lower bound applied to requested poll intervals.
pub const MIN_INTERVAL: Duration = Duration::from_millis(10);

/// Work performed on every tick.
#[async_trait]
pub trait PollTarget: Send + Sync + 'static {
    async fn on_tick(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Running,
}

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    interval: Duration,
}

pub struct PollingScheduler {
    domain: &'static str,
    running: Mutex<Option<Running>>,
    timers_spawned: AtomicU64,
    ticks: Arc<AtomicU64>,
}

impl PollingScheduler {
    pub fn new(domain: &'static str) -> Self {
        Self {
            domain,
            running: Mutex::new(None),
            timers_spawned: AtomicU64::new(0),
            ticks: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn state(&self) -> SchedulerState {
        match self.running.lock().unwrap().as_ref() {
            Some(r) if !r.handle.is_finished() => SchedulerState::Running,
            _ => SchedulerState::Stopped,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == SchedulerState::Running
    }

    /// Interval of the active timer, if any.
    pub fn interval(&self) -> Option<Duration> {
        self.running
            .lock()
            .unwrap()
            .as_ref()
            .filter(|r| !r.handle.is_finished())
            .map(|r| r.interval)
    }

    /// Number of timers this scheduler has ever spawned.
    pub fn timers_spawned(&self) -> u64 {
        self.timers_spawned.load(Ordering::SeqCst)
    }

    /// Number of ticks that reached the target.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    /// Starts the timer. With `immediate` the first tick fires right away,
    /// otherwise one interval from now. Returns false when a timer was
    /// already running. The timer holds only a weak reference to `target`
    /// and ends on its own once the target is dropped.
    pub fn start<T: PollTarget>(
        &self,
        interval: Duration,
        immediate: bool,
        target: Weak<T>,
    ) -> bool {
        let mut running = self.running.lock().unwrap();
        if let Some(r) = running.as_ref() {
            if !r.handle.is_finished() {
                debug!(
                    domain = self.domain,
                    interval_ms = r.interval.as_millis() as u64,
                    "polling already running, start ignored"
                );
                return false;
            }
        }

        let interval = if interval < MIN_INTERVAL {
            warn!(
                domain = self.domain,
                requested_ms = interval.as_millis() as u64,
                "poll interval too small, clamping"
            );
            MIN_INTERVAL
        } else {
            interval
        };

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(tick_loop(
            self.domain,
            interval,
            immediate,
            target,
            cancel.clone(),
            self.ticks.clone(),
        ));
        self.timers_spawned.fetch_add(1, Ordering::SeqCst);
        info!(
            domain = self.domain,
            interval_ms = interval.as_millis() as u64,
            "polling started"
        );
        *running = Some(Running {
            cancel,
            handle,
            interval,
        });
        true
    }

    /// Stops the timer. Returns false when nothing was running.
    pub fn stop(&self) -> bool {
        let Some(running) = self.running.lock().unwrap().take() else {
            return false;
        };
        running.cancel.cancel();
        let was_live = !running.handle.is_finished();
        if was_live {
            info!(domain = self.domain, "polling stopped");
        }
        was_live
    }
}

impl Drop for PollingScheduler {
    fn drop(&mut self) {
        if let Ok(mut running) = self.running.lock() {
            if let Some(r) = running.take() {
                r.cancel.cancel();
            }
        }
    }
}

async fn tick_loop<T: PollTarget>(
    domain: &'static str,
    period: Duration,
    immediate: bool,
    target: Weak<T>,
    cancel: CancellationToken,
    ticks: Arc<AtomicU64>,
) {
    let first = if immediate {
        Instant::now()
    } else {
        Instant::now() + period
    };
    let mut timer = interval_at(first, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(domain, "poll timer cancelled");
                return;
            }
            _ = timer.tick() => {}
        }

        let Some(target) = target.upgrade() else {
            debug!(domain, "poll target dropped, timer exiting");
            return;
        };
        ticks.fetch_add(1, Ordering::SeqCst);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(domain, "poll timer cancelled mid-tick");
                return;
            }
            _ = target.on_tick() => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        hits: AtomicU64,
    }

    #[async_trait]
    impl PollTarget for Counter {
        async fn on_tick(&self) {
            self.hits.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Slow {
        hits: AtomicU64,
        active: AtomicU64,
        overlapped: AtomicU64,
    }

    #[async_trait]
    impl PollTarget for Slow {
        async fn on_tick(&self) {
            if self.active.fetch_add(1, Ordering::SeqCst) > 0 {
                self.overlapped.fetch_add(1, Ordering::SeqCst);
            }
            tokio::time::sleep(Duration::from_secs(25)).await;
            self.hits.fetch_add(1, Ordering::SeqCst);
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        let scheduler = PollingScheduler::new("test");
        let target = Arc::new(Counter::default());

        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        assert!(scheduler.start(Duration::from_secs(30), false, Arc::downgrade(&target)));
        for _ in 0..4 {
            assert!(!scheduler.start(Duration::from_secs(5), true, Arc::downgrade(&target)));
        }
        assert_eq!(scheduler.timers_spawned(), 1);
        assert_eq!(scheduler.interval(), Some(Duration::from_secs(30)));

        tokio::time::sleep(Duration::from_secs(95)).await;
        settle().await;
        assert_eq!(target.hits.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.ticks(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent_and_halts_ticks() {
        let scheduler = PollingScheduler::new("test");
        let target = Arc::new(Counter::default());
        scheduler.start(Duration::from_secs(10), true, Arc::downgrade(&target));
        settle().await;
        assert_eq!(target.hits.load(Ordering::SeqCst), 1);

        assert!(scheduler.stop());
        assert!(!scheduler.stop());
        assert_eq!(scheduler.state(), SchedulerState::Stopped);

        tokio::time::sleep(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(target.hits.load(Ordering::SeqCst), 1);

        // Restart after stop spawns a fresh timer.
        assert!(scheduler.start(Duration::from_secs(10), false, Arc::downgrade(&target)));
        assert_eq!(scheduler.timers_spawned(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_ticks_never_overlap() {
        let scheduler = PollingScheduler::new("test");
        let target = Arc::new(Slow {
            hits: AtomicU64::new(0),
            active: AtomicU64::new(0),
            overlapped: AtomicU64::new(0),
        });
        scheduler.start(Duration::from_secs(10), true, Arc::downgrade(&target));

        tokio::time::sleep(Duration::from_secs(120)).await;
        settle().await;
        assert!(target.hits.load(Ordering::SeqCst) >= 3);
        assert_eq!(target.overlapped.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_exits_when_target_dropped() {
        let scheduler = PollingScheduler::new("test");
        let target = Arc::new(Counter::default());
        scheduler.start(Duration::from_secs(1), false, Arc::downgrade(&target));
        drop(target);

        tokio::time::sleep(Duration::from_secs(2)).await;
        settle().await;
        assert!(!scheduler.is_running());
    }
}
