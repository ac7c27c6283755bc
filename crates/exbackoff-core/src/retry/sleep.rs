//! Sleep strategies used between attempts
//!
//! The wait between two attempts is the only place a retry loop suspends.
//! [`ThreadSleeper`] blocks the calling thread. [`CooperativeSleeper`] is
//! picked when the runner is built inside a tokio runtime: it never sleeps
//! for less than [`MIN_COOPERATIVE_SLEEP`], and on a multi-threaded runtime
//! it hands the worker's other tasks off before blocking.
//!
//! A blocking sleep cannot yield. On a current-thread runtime only
//! [`BackoffRunner::run_async`](super::BackoffRunner::run_async) lets other
//! tasks make progress between attempts; a blocking `run` there stalls the
//! runtime for the whole delay and logs a warning.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::{Handle, RuntimeFlavor};

/// Smallest delay handed to a cooperative scheduler
pub const MIN_COOPERATIVE_SLEEP: Duration = Duration::from_millis(1);

/// Future returned by [`Sleeper::sleep_async`]
pub type SleepFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Waits out the delay between two attempts
pub trait Sleeper: Send + Sync {
    /// Block the calling thread for `delay`
    fn sleep(&self, delay: Duration);

    /// Suspend the current task for `delay`
    ///
    /// Used by [`BackoffRunner::run_async`](super::BackoffRunner::run_async).
    /// The default waits on the tokio timer, floored at
    /// [`MIN_COOPERATIVE_SLEEP`].
    fn sleep_async(&self, delay: Duration) -> SleepFuture {
        Box::pin(tokio::time::sleep(cooperative_delay(delay)))
    }
}

/// `delay`, raised to the cooperative minimum
pub fn cooperative_delay(delay: Duration) -> Duration {
    delay.max(MIN_COOPERATIVE_SLEEP)
}

/// Pick a sleeper for the current environment
///
/// Inside a tokio runtime this is a [`CooperativeSleeper`], otherwise a
/// [`ThreadSleeper`].
pub fn detect() -> Box<dyn Sleeper> {
    match Handle::try_current() {
        Ok(handle) => Box::new(CooperativeSleeper::new(handle.runtime_flavor())),
        Err(_) => Box::new(ThreadSleeper),
    }
}

/// Blocks the calling thread with `std::thread::sleep`
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, delay: Duration) {
        tracing::trace!(delay_us = delay.as_micros() as u64, "blocking sleep");
        std::thread::sleep(delay);
    }
}

/// Sleeper for code running on a tokio runtime
///
/// Blocking sleeps on a multi-thread worker go through
/// `tokio::task::block_in_place`, so the worker's queued tasks move to
/// another thread. A current-thread runtime has no other thread: the blocking
/// sleep stalls every task on it and a warning is logged. Use
/// [`Sleeper::sleep_async`] (through `run_async`) there.
#[derive(Debug, Clone, Copy)]
pub struct CooperativeSleeper {
    multi_thread: bool,
}

impl CooperativeSleeper {
    /// Create a sleeper for a runtime of the given flavor
    pub fn new(flavor: RuntimeFlavor) -> Self {
        Self {
            multi_thread: flavor == RuntimeFlavor::MultiThread,
        }
    }

    /// Whether the runtime seen at construction was multi-threaded
    pub fn is_multi_thread(&self) -> bool {
        self.multi_thread
    }

    /// Whether a blocking sleep from the current thread would stall a
    /// current-thread runtime
    pub fn blocks_scheduler(&self) -> bool {
        current_flavor() == Some(RuntimeFlavor::CurrentThread)
    }

    fn on_multi_thread_worker(&self) -> bool {
        self.multi_thread && current_flavor() == Some(RuntimeFlavor::MultiThread)
    }
}

fn current_flavor() -> Option<RuntimeFlavor> {
    Handle::try_current()
        .ok()
        .map(|handle| handle.runtime_flavor())
}

impl Sleeper for CooperativeSleeper {
    fn sleep(&self, delay: Duration) {
        let delay = cooperative_delay(delay);
        if self.on_multi_thread_worker() {
            tracing::trace!(delay_us = delay.as_micros() as u64, "cooperative sleep");
            tokio::task::block_in_place(|| std::thread::sleep(delay));
            return;
        }

        if self.blocks_scheduler() {
            tracing::warn!(
                delay_ms = delay.as_millis() as u64,
                "blocking sleep stalls the current-thread runtime; use run_async to yield"
            );
        } else {
            tracing::trace!(delay_us = delay.as_micros() as u64, "cooperative sleep");
        }
        std::thread::sleep(delay);
    }
}

/// Records requested delays without waiting
///
/// Useful for testing: clones share the same record, so a clone can be
/// handed to a runner and inspected afterwards.
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    delays: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays requested so far, in order
    pub fn delays(&self) -> Vec<Duration> {
        self.lock().clone()
    }

    /// Number of sleeps requested so far
    pub fn count(&self) -> usize {
        self.lock().len()
    }

    /// Forget the recorded delays
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn record(&self, delay: Duration) {
        self.lock().push(delay);
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Duration>> {
        // a poisoned record is still a valid record
        self.delays.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, delay: Duration) {
        self.record(delay);
    }

    fn sleep_async(&self, delay: Duration) -> SleepFuture {
        self.record(delay);
        Box::pin(std::future::ready(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_recording_sleeper_shares_record() {
        let sleeper = RecordingSleeper::new();
        let handle = sleeper.clone();

        sleeper.sleep(Duration::from_millis(3));
        sleeper.sleep(Duration::from_millis(6));

        assert_eq!(handle.count(), 2);
        assert_eq!(
            handle.delays(),
            vec![Duration::from_millis(3), Duration::from_millis(6)]
        );

        handle.clear();
        assert_eq!(sleeper.count(), 0);
    }

    #[tokio::test]
    async fn test_recording_sleeper_async_is_immediate() {
        let sleeper = RecordingSleeper::new();
        let start = Instant::now();
        sleeper.sleep_async(Duration::from_secs(60)).await;
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(sleeper.delays(), vec![Duration::from_secs(60)]);
    }

    #[test]
    fn test_cooperative_delay_floor() {
        assert_eq!(cooperative_delay(Duration::ZERO), MIN_COOPERATIVE_SLEEP);
        assert_eq!(
            cooperative_delay(Duration::from_micros(10)),
            MIN_COOPERATIVE_SLEEP
        );
        assert_eq!(
            cooperative_delay(Duration::from_millis(5)),
            Duration::from_millis(5)
        );
    }

    #[test]
    fn test_thread_sleeper_blocks() {
        let start = Instant::now();
        ThreadSleeper.sleep(Duration::from_millis(5));
        assert!(start.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn test_detect_outside_runtime() {
        // no runtime here: must not panic and must block
        let sleeper = detect();
        let start = Instant::now();
        sleeper.sleep(Duration::from_millis(2));
        assert!(start.elapsed() >= Duration::from_millis(2));
    }

    #[test]
    fn test_cooperative_sleeper_applies_floor() {
        let sleeper = CooperativeSleeper::new(RuntimeFlavor::CurrentThread);
        let start = Instant::now();
        sleeper.sleep(Duration::ZERO);
        assert!(start.elapsed() >= MIN_COOPERATIVE_SLEEP);
    }

    #[test]
    fn test_cooperative_sleeper_records_flavor() {
        let multi = CooperativeSleeper::new(RuntimeFlavor::MultiThread);
        let copy = multi;
        assert!(multi.is_multi_thread());
        assert!(copy.is_multi_thread());
        assert!(!CooperativeSleeper::new(RuntimeFlavor::CurrentThread).is_multi_thread());
        // no runtime, nothing to stall
        assert!(!multi.blocks_scheduler());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cooperative_sleeper_on_multi_thread_runtime() {
        let sleeper = CooperativeSleeper::new(RuntimeFlavor::MultiThread);
        assert!(sleeper.on_multi_thread_worker());
        assert!(!sleeper.blocks_scheduler());
        let start = Instant::now();
        sleeper.sleep(Duration::from_millis(2));
        assert!(start.elapsed() >= Duration::from_millis(2));
    }

    #[tokio::test]
    async fn test_cooperative_sleeper_on_current_thread_runtime() {
        let sleeper = CooperativeSleeper::new(RuntimeFlavor::MultiThread);
        // flavor recorded as multi-thread, but the current runtime is not
        assert!(!sleeper.on_multi_thread_worker());
        assert!(sleeper.blocks_scheduler());
        sleeper.sleep(Duration::from_millis(1));
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    fn capture_warnings(logs: &CapturedLogs, f: impl FnOnce()) {
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, f);
    }

    #[tokio::test]
    async fn test_blocking_sleep_on_current_thread_runtime_warns() {
        let logs = CapturedLogs::default();
        let sleeper = CooperativeSleeper::new(RuntimeFlavor::CurrentThread);

        capture_warnings(&logs, || sleeper.sleep(Duration::ZERO));

        let output = logs.contents();
        assert!(output.contains("WARN"), "no warning in: {}", output);
        assert!(output.contains("run_async"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_blocking_sleep_on_multi_thread_runtime_is_quiet() {
        let logs = CapturedLogs::default();
        let sleeper = CooperativeSleeper::new(RuntimeFlavor::MultiThread);

        capture_warnings(&logs, || sleeper.sleep(Duration::ZERO));

        assert!(!logs.contents().contains("WARN"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_sleep_async_uses_tokio_timer() {
        let start = tokio::time::Instant::now();
        ThreadSleeper.sleep_async(Duration::from_secs(30)).await;
        assert!(start.elapsed() >= Duration::from_secs(30));

        let start = tokio::time::Instant::now();
        ThreadSleeper.sleep_async(Duration::ZERO).await;
        assert!(start.elapsed() >= MIN_COOPERATIVE_SLEEP);
    }
}
