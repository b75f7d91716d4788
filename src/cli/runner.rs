//! Cancellable Runner
//!
//! Streams an executor's results to the caller one at a time. The executor
//! runs on a blocking worker; a producer task forwards each result and waits
//! for the consumer to acknowledge it before letting the worker continue.
//! While idle it polls a cancellation predicate and spins a progress glyph.

use std::io::{self, IsTerminal, Write};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::debug;

use super::executor::{Command, ExecutionResult, Executor, ResultSink};

pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

const SPINNER_GLYPHS: [char; 5] = ['/', '|', '-', '\\', '|'];
pub(crate) const CLEAR_LINE: &str = "\x1b[2K\x1b[0G";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Running,
    Terminated,
}

/// Rotating progress glyph drawn while waiting on the server
pub struct Spinner {
    out: Option<Box<dyn Write + Send>>,
    counter: usize,
}

impl Spinner {
    /// Draw on stderr when it is a terminal
    pub fn stderr() -> Self {
        let out: Option<Box<dyn Write + Send>> = if io::stderr().is_terminal() {
            Some(Box::new(io::stderr()))
        } else {
            None
        };
        Spinner { out, counter: 0 }
    }

    pub fn hidden() -> Self {
        Spinner { out: None, counter: 0 }
    }

    fn tick(&mut self) {
        if let Some(out) = self.out.as_mut() {
            let glyph = SPINNER_GLYPHS[self.counter % SPINNER_GLYPHS.len()];
            let _ = write!(out, "{}{}", CLEAR_LINE, glyph);
            let _ = out.flush();
        }
        self.counter += 1;
    }

    fn clear(&mut self) {
        if self.counter == 0 {
            return;
        }
        if let Some(out) = self.out.as_mut() {
            let _ = write!(out, "{}", CLEAR_LINE);
            let _ = out.flush();
        }
    }
}

/// Worker-side sink: one slot, blocks until the producer acknowledges
struct ChannelSink {
    tx: mpsc::Sender<Option<ExecutionResult>>,
    ack: mpsc::Receiver<()>,
    handle: Handle,
}

impl ResultSink for ChannelSink {
    fn publish(&mut self, result: ExecutionResult) -> bool {
        self.tx.blocking_send(Some(result)).is_ok() && self.ack.blocking_recv().is_some()
    }

    /// Sleep, but wake as soon as the producer drops its receiver so the
    /// executor lock is released right after a cancel.
    fn pause(&mut self, delay: Duration) -> bool {
        let tx = &self.tx;
        self.handle
            .block_on(async { tokio::time::timeout(delay, tx.closed()).await })
            .is_err()
    }

    fn finish(&mut self) {
        let _ = self.tx.blocking_send(None);
    }
}

/// Starts commands on a shared executor
pub struct Runner {
    executor: Arc<Mutex<Executor>>,
    poll_interval: Duration,
    spinner: bool,
}

impl Runner {
    pub fn new(executor: Arc<Mutex<Executor>>) -> Self {
        Runner {
            executor,
            poll_interval: POLL_INTERVAL,
            spinner: true,
        }
    }

    pub fn with_spinner(mut self, enabled: bool) -> Self {
        self.spinner = enabled;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Start `command`. `cancel` is polled while idle and between results;
    /// once it returns true, remaining repeats are abandoned.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<F>(&self, command: Command, cancel: F) -> ResultStream
    where
        F: Fn() -> bool + Send + 'static,
    {
        let (work_tx, mut work_rx) = mpsc::channel(1);
        let (work_ack_tx, work_ack_rx) = mpsc::channel(1);
        let executor = Arc::clone(&self.executor);
        let handle = Handle::current();

        tokio::task::spawn_blocking(move || {
            let mut sink = ChannelSink {
                tx: work_tx,
                ack: work_ack_rx,
                handle,
            };
            executor.lock().execute(command, &mut sink);
        });

        let (out_tx, out_rx) = mpsc::channel(1);
        let (ack_tx, mut ack_rx) = mpsc::channel::<()>(1);
        let poll = self.poll_interval;
        let mut spinner = if self.spinner {
            Spinner::stderr()
        } else {
            Spinner::hidden()
        };

        tokio::spawn(async move {
            loop {
                match tokio::time::timeout(poll, work_rx.recv()).await {
                    Ok(Some(Some(result))) => {
                        spinner.clear();
                        if out_tx.send(Some(result)).await.is_err() {
                            return;
                        }
                        if ack_rx.recv().await.is_none() {
                            return;
                        }
                        if cancel() {
                            debug!("cancelled between results");
                            break;
                        }
                        if work_ack_tx.send(()).await.is_err() {
                            break;
                        }
                    }
                    // End marker, or the worker went away.
                    Ok(_) => {
                        spinner.clear();
                        break;
                    }
                    Err(_) => {
                        if cancel() {
                            spinner.clear();
                            debug!("cancelled while waiting");
                            break;
                        }
                        spinner.tick();
                    }
                }
            }
            // Stops the worker at its next handoff or in the middle of a delay.
            drop(work_rx);
            drop(work_ack_tx);
            let _ = out_tx.send(None).await;
        });

        ResultStream {
            rx: out_rx,
            ack: ack_tx,
            awaiting_ack: false,
            state: RunnerState::Running,
        }
    }
}

/// Consumer end of a running command
pub struct ResultStream {
    rx: mpsc::Receiver<Option<ExecutionResult>>,
    ack: mpsc::Sender<()>,
    awaiting_ack: bool,
    state: RunnerState,
}

impl ResultStream {
    /// Acknowledge the previous result and wait for the next one.
    /// `None` is the end-of-sequence marker.
    pub async fn next(&mut self) -> Option<ExecutionResult> {
        if self.state == RunnerState::Terminated {
            return None;
        }
        if self.awaiting_ack {
            self.awaiting_ack = false;
            let _ = self.ack.send(()).await;
        }
        match self.rx.recv().await {
            Some(Some(result)) => {
                self.awaiting_ack = true;
                Some(result)
            }
            _ => {
                self.state = RunnerState::Terminated;
                None
            }
        }
    }

    pub fn state(&self) -> RunnerState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::client::mock::MemoryStore;
    use crate::cli::config::ConnectionOptions;
    use crate::cli::executor::CommandOptions;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Instant;

    fn runner(store: MemoryStore) -> Runner {
        let executor = Executor::new(ConnectionOptions::default(), Box::new(store));
        Runner::new(Arc::new(Mutex::new(executor))).with_spinner(false)
    }

    fn ping(repeat: u32, delay: f64) -> Command {
        Command::new(
            vec!["PING".to_string()],
            CommandOptions {
                repeat,
                delay,
                ..CommandOptions::default()
            },
        )
    }

    #[tokio::test]
    async fn test_streams_all_repeats_in_order() {
        let runner = runner(MemoryStore::new());
        let mut stream = runner.start(ping(4, 0.0), || false);

        let mut seen = 0;
        while let Some(result) = stream.next().await {
            assert_eq!(result.value().cloned(), Some(crate::cli::reply::Reply::text("PONG")));
            seen += 1;
        }
        assert_eq!(seen, 4);
        assert_eq!(stream.state(), RunnerState::Terminated);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_repeat_delay_timing() {
        let runner = runner(MemoryStore::new());
        let mut stream = runner.start(ping(3, 0.1), || false);

        let start = Instant::now();
        let first = stream.next().await;
        let first_at = start.elapsed();
        assert!(first.is_some());
        assert!(first_at < Duration::from_millis(100));

        let mut last_at = first_at;
        let mut count = 1;
        while stream.next().await.is_some() {
            count += 1;
            last_at = start.elapsed();
        }
        assert_eq!(count, 3);
        assert!(last_at - first_at >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_cancel_mid_repeat() {
        let store = MemoryStore::new();
        let log = store.calls();
        let runner = runner(store);

        let consumed = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&consumed);
        let mut stream = runner.start(ping(5, 0.0), move || seen.load(Ordering::SeqCst) >= 2);

        let mut results = 0;
        while stream.next().await.is_some() {
            results += 1;
            consumed.fetch_add(1, Ordering::SeqCst);
        }
        assert_eq!(results, 2);
        assert_eq!(stream.state(), RunnerState::Terminated);

        // Give the worker a moment to observe the closed channel.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(log.lock().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancel_while_idle() {
        let runner = runner(MemoryStore::new()).with_poll_interval(Duration::from_millis(10));
        let flag = Arc::new(AtomicBool::new(false));
        let cancel = Arc::clone(&flag);
        let mut stream = runner.start(ping(3, 1.0), move || cancel.load(Ordering::SeqCst));

        assert!(stream.next().await.is_some());
        flag.store(true, Ordering::SeqCst);

        let start = Instant::now();
        assert!(stream.next().await.is_none());
        assert!(start.elapsed() < Duration::from_millis(900));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancel_during_delay_releases_connection() {
        let store = MemoryStore::new();
        let log = store.calls();
        let runner = runner(store).with_poll_interval(Duration::from_millis(10));
        let flag = Arc::new(AtomicBool::new(false));
        let cancel = Arc::clone(&flag);
        let mut stream = runner.start(ping(5, 3.0), move || cancel.load(Ordering::SeqCst));

        assert!(stream.next().await.is_some());
        let raise = Arc::clone(&flag);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            raise.store(true, Ordering::SeqCst);
        });
        assert!(stream.next().await.is_none());

        let start = Instant::now();
        let mut next = runner.start(ping(1, 0.0), || false);
        assert!(next.next().await.is_some());
        assert!(next.next().await.is_none());
        assert!(start.elapsed() < Duration::from_millis(500));
        assert_eq!(log.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_executor_reusable_after_run() {
        let runner = runner(MemoryStore::new());
        for _ in 0..2 {
            let mut stream = runner.start(ping(1, 0.0), || false);
            assert!(stream.next().await.is_some());
            assert!(stream.next().await.is_none());
        }
    }
}
