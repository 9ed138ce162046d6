//! Serial executors
//!
//! A [`SerialExecutor`] owns one named OS thread that runs submitted jobs
//! strictly in submission order. The registry uses one for bulk operations
//! (the background worker) and, unless the host supplies its own, one as
//! the UI context that delivers listener callbacks.

use crate::contract::SettingsError;
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::JoinHandle;
use tokio::sync::{mpsc, oneshot};

/// Unit of work run on an executor thread
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// FIFO job runner on a dedicated thread
pub struct SerialExecutor {
    name: String,
    tx: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl SerialExecutor {
    /// Start the executor thread
    pub fn spawn(name: &str) -> Result<Self, SettingsError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let thread_name = name.to_string();
        let handle = std::thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                while let Some(job) = rx.blocking_recv() {
                    if catch_unwind(AssertUnwindSafe(job)).is_err() {
                        tracing::error!(executor = %thread_name, "Job panicked");
                    }
                }
                tracing::debug!(executor = %thread_name, "Executor stopped");
            })
            .map_err(|e| {
                tracing::error!(executor = %name, error = %e, "Failed to start executor thread");
                SettingsError::WorkerStopped
            })?;

        Ok(Self {
            name: name.to_string(),
            tx: Mutex::new(Some(tx)),
            handle: Mutex::new(Some(handle)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue a job; fails once the executor has been shut down
    pub fn submit(&self, job: Job) -> Result<(), SettingsError> {
        let tx = self.tx.lock();
        let sender = tx.as_ref().ok_or(SettingsError::WorkerStopped)?;
        sender.send(job).map_err(|_| SettingsError::WorkerStopped)
    }

    /// Resolves once every job queued before this call has run
    pub fn barrier(&self) -> Result<oneshot::Receiver<()>, SettingsError> {
        let (done_tx, done_rx) = oneshot::channel();
        self.submit(Box::new(move || {
            let _ = done_tx.send(());
        }))?;
        Ok(done_rx)
    }

    pub fn is_running(&self) -> bool {
        self.tx.lock().is_some()
    }

    /// Stop accepting jobs, let queued jobs finish and join the thread.
    ///
    /// Calling this from the executor's own thread only closes the queue.
    pub fn shutdown(&self) {
        drop(self.tx.lock().take());
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() == std::thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                tracing::warn!(executor = %self.name, "Executor thread terminated abnormally");
            }
        }
    }
}

impl Drop for SerialExecutor {
    fn drop(&mut self) {
        drop(self.tx.lock().take());
    }
}

/// Context on which listener callbacks run
pub trait UiDispatcher: Send + Sync {
    /// Schedule `task`; tasks run one at a time in the order dispatched
    fn dispatch(&self, task: Job);
}

/// UI context backed by a dedicated [`SerialExecutor`] thread
pub struct ThreadDispatcher {
    executor: SerialExecutor,
}

impl ThreadDispatcher {
    pub fn spawn() -> Result<Self, SettingsError> {
        Ok(Self {
            executor: SerialExecutor::spawn("settings-ui")?,
        })
    }

    pub fn shutdown(&self) {
        self.executor.shutdown();
    }
}

impl UiDispatcher for ThreadDispatcher {
    fn dispatch(&self, task: Job) {
        if self.executor.submit(task).is_err() {
            tracing::warn!("UI context stopped; dropping callback");
        }
    }
}

/// Runs tasks immediately on the calling thread
///
/// For hosts that already serialize settings calls on their main thread.
#[derive(Default)]
pub struct InlineDispatcher;

impl UiDispatcher for InlineDispatcher {
    fn dispatch(&self, task: Job) {
        task();
    }
}
