use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

/// Something the shared timer drives.
#[async_trait]
pub trait PollTarget: Send + Sync + 'static {
    async fn tick(&self);
    /// Whether anything still needs the timer. Checked under the poller lock.
    fn wants_polling(&self) -> bool;
    fn poller(&self) -> &Poller;
    fn on_retired(&self);
}

struct PollerState {
    generation: u64,
    stop_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

/// A single lazily-started recurring timer. Ticks run sequentially inside one task, so a
/// slow tick delays the next one instead of overlapping it.
#[derive(Default)]
pub struct Poller {
    slot: Mutex<Option<PollerState>>,
    generations: AtomicU64,
}

impl Poller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        match self.slot.lock() {
            Ok(slot) => slot.is_some(),
            Err(_) => false,
        }
    }

    /// Starts the timer unless it is already running or `target` has nothing to poll.
    /// Returns true when a new timer was spawned.
    pub fn start<T: PollTarget>(&self, period: Duration, target: Weak<T>) -> bool {
        let mut slot = match self.slot.lock() {
            Ok(slot) => slot,
            Err(_) => return false,
        };
        if slot.is_some() {
            return false;
        }
        match target.upgrade() {
            Some(strong) if strong.wants_polling() => {}
            _ => return false,
        }

        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break,
                    _ = interval.tick() => {
                        let target = match target.upgrade() {
                            Some(target) => target,
                            None => break,
                        };
                        target.tick().await;
                        if target.poller().retire(generation, target.as_ref()) {
                            target.on_retired();
                            break;
                        }
                    }
                }
            }
            debug!(generation, "poll timer exited");
        });
        *slot = Some(PollerState {
            generation,
            stop_tx: Some(stop_tx),
            task,
        });
        debug!(generation, ?period, "poll timer started");
        true
    }

    /// Clears the slot when it still belongs to `generation` and the target is idle.
    fn retire<T: PollTarget + ?Sized>(&self, generation: u64, target: &T) -> bool {
        let mut slot = match self.slot.lock() {
            Ok(slot) => slot,
            Err(_) => return true,
        };
        let owned = matches!(slot.as_ref(), Some(state) if state.generation == generation);
        if owned && !target.wants_polling() {
            slot.take();
            return true;
        }
        false
    }

    /// Stops the timer after its current tick if `idle` holds. Returns true when stopped.
    pub fn stop_if(&self, idle: impl FnOnce() -> bool) -> bool {
        let state = {
            let mut slot = match self.slot.lock() {
                Ok(slot) => slot,
                Err(_) => return false,
            };
            if slot.is_none() || !idle() {
                return false;
            }
            slot.take()
        };
        if let Some(mut state) = state {
            if let Some(stop_tx) = state.stop_tx.take() {
                let _ = stop_tx.send(());
            }
            return true;
        }
        false
    }

    /// Cancels the timer immediately, including any in-flight tick.
    pub fn abort(&self) -> bool {
        let state = match self.slot.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        match state {
            Some(state) => {
                state.task.abort();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    struct Countdown {
        poller: Poller,
        remaining: AtomicUsize,
        ticks: AtomicUsize,
        retired: AtomicUsize,
    }

    impl Countdown {
        fn new(remaining: usize) -> Arc<Self> {
            Arc::new(Self {
                poller: Poller::new(),
                remaining: AtomicUsize::new(remaining),
                ticks: AtomicUsize::new(0),
                retired: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PollTarget for Countdown {
        async fn tick(&self) {
            self.ticks.fetch_add(1, Ordering::SeqCst);
            let _ = self
                .remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        }

        fn wants_polling(&self) -> bool {
            self.remaining.load(Ordering::SeqCst) > 0
        }

        fn poller(&self) -> &Poller {
            &self.poller
        }

        fn on_retired(&self) {
            self.retired.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn wait_until(check: impl Fn() -> bool) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !check() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn retires_once_target_is_idle() {
        let target = Countdown::new(3);
        assert!(target.poller.start(Duration::from_millis(10), Arc::downgrade(&target)));
        assert!(target.poller.is_running());

        wait_until(|| !target.poller.is_running()).await;
        assert_eq!(target.ticks.load(Ordering::SeqCst), 3);
        assert_eq!(target.retired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn does_not_start_twice_or_when_idle() {
        let idle = Countdown::new(0);
        assert!(!idle.poller.start(Duration::from_millis(10), Arc::downgrade(&idle)));

        let busy = Countdown::new(100);
        assert!(busy.poller.start(Duration::from_secs(60), Arc::downgrade(&busy)));
        assert!(!busy.poller.start(Duration::from_secs(60), Arc::downgrade(&busy)));
        assert!(busy.poller.abort());
        assert!(!busy.poller.is_running());
    }

    #[tokio::test]
    async fn stop_if_respects_predicate() {
        let target = Countdown::new(100);
        target.poller.start(Duration::from_secs(60), Arc::downgrade(&target));
        assert!(!target.poller.stop_if(|| false));
        assert!(target.poller.is_running());
        assert!(target.poller.stop_if(|| true));
        assert!(!target.poller.is_running());
    }

    #[tokio::test]
    async fn no_tick_runs_after_stop() {
        let target = Countdown::new(1_000);
        target.poller.start(Duration::from_millis(5), Arc::downgrade(&target));
        wait_until(|| target.ticks.load(Ordering::SeqCst) >= 2).await;

        assert!(target.poller.stop_if(|| true));
        let stopped_at = target.ticks.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(target.ticks.load(Ordering::SeqCst), stopped_at);
        assert_eq!(target.retired.load(Ordering::SeqCst), 0);
    }
}
