//! Interval-driven polling of a long-running remote job.
//!
//! A [`Poller`] is `Idle` or `Running`. While running, a spawned tokio task
//! fetches, hands the result to `on_data`, and either stops (when
//! `should_stop` says so) or sleeps for the interval and fetches again. A
//! failed fetch reports through `on_error` and stops; there is no retry.
//!
//! Every `start()` opens a new session tagged with a generation number and
//! `stop()` bumps it. A fetch that completes after its session ended is
//! dropped without touching any callback. At most one fetch is in flight per
//! poller, across sessions too: a tick that finds one outstanding is skipped.

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

use crate::error::{KgError, Result};

pub type FetchFn<T> = Box<dyn Fn() -> BoxFuture<'static, Result<T>> + Send + Sync>;
pub type DataFn<T> = Box<dyn Fn(&T) + Send + Sync>;
pub type StopFn<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;
pub type ErrorFn = Box<dyn Fn(&str) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    Idle,
    Running,
}

/// Construction-time parameters of a [`Poller`].
pub struct PollerOptions<T> {
    interval: Duration,
    fetch: FetchFn<T>,
    on_data: DataFn<T>,
    should_stop: StopFn<T>,
    on_error: ErrorFn,
}

impl<T: Send + 'static> PollerOptions<T> {
    /// Poll `fetch` every `interval`. Without further options the data is
    /// ignored, polling never stops on its own, and errors are logged.
    pub fn new<F, Fut>(interval: Duration, fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            interval,
            fetch: Box::new(move || fetch().boxed()),
            on_data: Box::new(|_: &T| {}),
            should_stop: Box::new(|_: &T| false),
            on_error: Box::new(|message: &str| log::error!("poll failed: {}", message)),
        }
    }

    pub fn on_data(mut self, f: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.on_data = Box::new(f);
        self
    }

    pub fn should_stop(mut self, f: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        self.should_stop = Box::new(f);
        self
    }

    pub fn on_error(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_error = Box::new(f);
        self
    }
}

struct PollState {
    status: PollStatus,
    generation: u64,
    in_flight: bool,
}

struct Shared<T> {
    options: PollerOptions<T>,
    state: Mutex<PollState>,
    /// Publishes the generation on every stop; sleeping sessions wake and exit.
    cancel: watch::Sender<u64>,
}

/// Polling state machine. Dropping it stops polling.
///
/// Callbacks run on the polling task while the poller's state lock is held, so
/// they must not call back into the same poller.
pub struct Poller<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Send + 'static> Poller<T> {
    pub fn new(options: PollerOptions<T>) -> Self {
        let (cancel, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                options,
                state: Mutex::new(PollState {
                    status: PollStatus::Idle,
                    generation: 0,
                    in_flight: false,
                }),
                cancel,
            }),
        }
    }

    pub fn status(&self) -> PollStatus {
        self.shared.state.lock().unwrap().status
    }

    pub fn is_running(&self) -> bool {
        self.status() == PollStatus::Running
    }

    /// Idle -> Running and fetch immediately. No-op when already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let generation = {
            let mut state = self.shared.state.lock().unwrap();
            if state.status == PollStatus::Running {
                return;
            }
            state.status = PollStatus::Running;
            state.generation += 1;
            state.generation
        };
        let cancel = self.shared.cancel.subscribe();
        log::debug!("poller session {} started", generation);
        tokio::spawn(run_session(self.shared.clone(), generation, cancel));
    }

    /// Any state -> Idle. Cancels the pending tick and invalidates an
    /// in-flight fetch. Idempotent.
    pub fn stop(&self) {
        let mut state = self.shared.state.lock().unwrap();
        if state.status == PollStatus::Running {
            log::debug!("poller session {} stopped", state.generation);
        }
        state.status = PollStatus::Idle;
        state.generation += 1;
        self.shared.cancel.send_replace(state.generation);
    }
}

impl<T> Drop for Poller<T> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.shared.state.lock() {
            state.status = PollStatus::Idle;
            state.generation += 1;
            self.shared.cancel.send_replace(state.generation);
        }
    }
}

impl<T> Shared<T> {
    /// Claim the fetch slot for `generation`. `None` means the session is over,
    /// `Some(false)` that another fetch is still outstanding.
    fn begin_tick(&self, generation: u64) -> Option<bool> {
        let mut state = self.state.lock().unwrap();
        if state.generation != generation || state.status != PollStatus::Running {
            return None;
        }
        if state.in_flight {
            return Some(false);
        }
        state.in_flight = true;
        Some(true)
    }

    /// Apply a fetch result. Returns whether the session keeps polling.
    fn complete(&self, generation: u64, result: Result<T>) -> bool {
        let mut state = self.state.lock().unwrap();
        state.in_flight = false;

        if state.generation != generation || state.status != PollStatus::Running {
            log::debug!("discarding poll result from ended session {}", generation);
            return false;
        }

        match result {
            Ok(data) => {
                (self.options.on_data)(&data);
                if (self.options.should_stop)(&data) {
                    log::debug!("poller session {} finished", generation);
                    state.status = PollStatus::Idle;
                    return false;
                }
                true
            }
            Err(e) => {
                log::warn!("poller session {} failed ({}): {}", generation, e.kind(), e);
                (self.options.on_error)(&e.to_string());
                state.status = PollStatus::Idle;
                false
            }
        }
    }
}

async fn run_session<T>(shared: Arc<Shared<T>>, generation: u64, mut cancel: watch::Receiver<u64>)
where
    T: Send + 'static,
{
    loop {
        match shared.begin_tick(generation) {
            None => return,
            Some(true) => {
                let fetch = AssertUnwindSafe(async { (shared.options.fetch)().await });
                let result = match fetch.catch_unwind().await {
                    Ok(result) => result,
                    Err(_) => Err(KgError::Extraction("poll fetch panicked".to_string())),
                };
                if !shared.complete(generation, result) {
                    return;
                }
            }
            Some(false) => {
                log::debug!("poller session {}: fetch still in flight, skipping tick", generation);
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(shared.options.interval) => {}
            _ = cancel.changed() => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;
    use tokio::sync::Notify;

    async fn wait_until(cond: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_polls_until_should_stop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let fetch_calls = calls.clone();
        let sink = seen.clone();
        let poller = Poller::new(
            PollerOptions::new(Duration::from_millis(5), move || {
                let n = fetch_calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Ok(n) }
            })
            .on_data(move |n: &usize| sink.lock().unwrap().push(*n))
            .should_stop(|n| *n >= 3),
        );

        assert_eq!(poller.status(), PollStatus::Idle);
        poller.start();
        assert!(poller.is_running());
        wait_until(|| poller.status() == PollStatus::Idle).await;

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_error_stops_without_retry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(Mutex::new(Vec::<String>::new()));

        let fetch_calls = calls.clone();
        let sink = errors.clone();
        let poller = Poller::new(
            PollerOptions::new(Duration::from_millis(5), move || {
                fetch_calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(KgError::Timeout) }
            })
            .on_data(|_| panic!("no data expected"))
            .on_error(move |m| sink.lock().unwrap().push(m.to_string())),
        );

        poller.start();
        wait_until(|| poller.status() == PollStatus::Idle).await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*errors.lock().unwrap(), vec!["Request timed out".to_string()]);
    }

    #[tokio::test]
    async fn test_late_response_after_stop_is_discarded() {
        let gate = Arc::new(Notify::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let data_calls = Arc::new(AtomicUsize::new(0));

        let fetch_gate = gate.clone();
        let fetch_calls = calls.clone();
        let on_data_calls = data_calls.clone();
        let poller = Poller::new(
            PollerOptions::new(Duration::from_millis(5), move || {
                fetch_calls.fetch_add(1, Ordering::SeqCst);
                let gate = fetch_gate.clone();
                async move {
                    gate.notified().await;
                    Ok(42)
                }
            })
            .on_data(move |_: &i32| {
                on_data_calls.fetch_add(1, Ordering::SeqCst);
            }),
        );

        poller.start();
        wait_until(|| calls.load(Ordering::SeqCst) == 1).await;
        poller.stop();
        gate.notify_one();
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(data_calls.load(Ordering::SeqCst), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(poller.status(), PollStatus::Idle);
    }

    #[tokio::test]
    async fn test_never_more_than_one_fetch_in_flight() {
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));

        let a = active.clone();
        let m = max_active.clone();
        let poller = Poller::new(PollerOptions::new(Duration::from_millis(2), move || {
            let a = a.clone();
            let m = m.clone();
            async move {
                let now = a.fetch_add(1, Ordering::SeqCst) + 1;
                m.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(25)).await;
                a.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        }));

        // Restart repeatedly while a slow fetch is outstanding
        for _ in 0..4 {
            poller.start();
            tokio::time::sleep(Duration::from_millis(8)).await;
            poller.stop();
        }
        poller.start();
        tokio::time::sleep(Duration::from_millis(120)).await;
        poller.stop();

        assert_eq!(max_active.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_start_is_idempotent_and_stop_is_idempotent() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetch_calls = calls.clone();
        let poller = Poller::new(PollerOptions::new(Duration::from_secs(60), move || {
            fetch_calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        }));

        poller.start();
        poller.start();
        wait_until(|| calls.load(Ordering::SeqCst) >= 1).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        // One session, one immediate fetch, next tick a minute away
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        poller.stop();
        poller.stop();
        assert_eq!(poller.status(), PollStatus::Idle);
    }

    #[tokio::test]
    async fn test_stop_cancels_pending_tick() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetch_calls = calls.clone();
        let poller = Poller::new(PollerOptions::new(Duration::from_millis(30), move || {
            fetch_calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        }));

        poller.start();
        wait_until(|| calls.load(Ordering::SeqCst) == 1).await;
        poller.stop();
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Restart opens a fresh session that fetches right away
        poller.start();
        wait_until(|| calls.load(Ordering::SeqCst) == 2).await;
        poller.stop();
    }

    #[tokio::test]
    async fn test_panicking_fetch_reports_error_and_allows_restart() {
        let calls = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(Mutex::new(Vec::<String>::new()));

        let fetch_calls = calls.clone();
        let sink = errors.clone();
        let poller = Poller::new(
            PollerOptions::new(Duration::from_millis(5), move || {
                let n = fetch_calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n == 1 {
                        panic!("fetch blew up");
                    }
                    Ok(n)
                }
            })
            .should_stop(|_: &usize| true)
            .on_error(move |m| sink.lock().unwrap().push(m.to_string())),
        );

        poller.start();
        wait_until(|| !errors.lock().unwrap().is_empty()).await;
        assert_eq!(poller.status(), PollStatus::Idle);
        assert!(errors.lock().unwrap()[0].contains("panicked"));

        // The fetch slot was released, so a restart polls again
        poller.start();
        wait_until(|| calls.load(Ordering::SeqCst) == 2).await;
        wait_until(|| poller.status() == PollStatus::Idle).await;
        assert_eq!(errors.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_drop_stops_polling() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetch_calls = calls.clone();
        let poller = Poller::new(PollerOptions::new(Duration::from_millis(5), move || {
            fetch_calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        }));

        poller.start();
        wait_until(|| calls.load(Ordering::SeqCst) >= 2).await;
        drop(poller);
        let at_drop = calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(calls.load(Ordering::SeqCst), at_drop);
    }
}
