//! Single dedicated thread for all accessibility provider calls
//!
//! The provider is only reentrant from the thread that initialised it, so
//! every unit of provider work is queued here and executed one at a time in
//! arrival order. Callers await the result over a oneshot channel.

use crate::AutomationError;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, ThreadId};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

// Unit lifecycle: QUEUED -> RUNNING -> DONE, or QUEUED -> CANCELLED.
const QUEUED: u8 = 0;
const RUNNING: u8 = 1;
const DONE: u8 = 2;
const CANCELLED: u8 = 3;

struct Unit {
    state: Arc<AtomicU8>,
    job: Box<dyn FnOnce() + Send + 'static>,
}

struct WorkerShared {
    sender: mpsc::Sender<Unit>,
    thread_id: ThreadId,
    name: String,
}

/// Handle to the UI worker. Cheap to clone; the thread exits once every
/// handle is dropped and the queue drains.
#[derive(Clone)]
pub struct UiWorker {
    shared: Arc<WorkerShared>,
}

impl std::fmt::Debug for UiWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiWorker")
            .field("name", &self.shared.name)
            .field("thread_id", &self.shared.thread_id)
            .finish()
    }
}

impl UiWorker {
    /// Starts the worker thread and runs `init` on it before accepting work.
    ///
    /// Returns the init failure if `init` fails; the thread then exits.
    pub fn spawn<I>(name: &str, init: I) -> Result<UiWorker, AutomationError>
    where
        I: FnOnce() -> Result<(), AutomationError> + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel::<Unit>();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), AutomationError>>(1);
        let thread_name = name.to_string();

        let handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                let init_result = run_guarded(init);
                let failed = init_result.is_err();
                if ready_tx.send(init_result).is_err() || failed {
                    return;
                }
                debug!("UI worker '{}' accepting work", thread_name);

                while let Ok(unit) = receiver.recv() {
                    if unit
                        .state
                        .compare_exchange(QUEUED, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
                        .is_err()
                    {
                        trace!("skipping cancelled unit");
                        continue;
                    }
                    (unit.job)();
                    unit.state.store(DONE, Ordering::SeqCst);
                }
                debug!("UI worker '{}' stopped", thread_name);
            })
            .map_err(|e| AutomationError::Internal(format!("failed to spawn UI worker: {e}")))?;

        let thread_id = handle.thread().id();
        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!("UI worker '{}' started", name);
                Ok(UiWorker {
                    shared: Arc::new(WorkerShared {
                        sender,
                        thread_id,
                        name: name.to_string(),
                    }),
                })
            }
            Ok(Err(e)) => {
                error!("UI worker '{}' failed to initialise: {}", name, e);
                Err(e)
            }
            Err(_) => Err(AutomationError::Internal(format!(
                "UI worker '{name}' exited during initialisation"
            ))),
        }
    }

    pub fn thread_id(&self) -> ThreadId {
        self.shared.thread_id
    }

    /// Whether the calling thread is the worker thread.
    pub fn is_worker_thread(&self) -> bool {
        thread::current().id() == self.shared.thread_id
    }

    /// Runs `work` on the worker and awaits its result.
    pub async fn submit<F, R>(&self, work: F) -> Result<R, AutomationError>
    where
        F: FnOnce() -> Result<R, AutomationError> + Send + 'static,
        R: Send + 'static,
    {
        self.submit_with_cancel(work, CancellationToken::new()).await
    }

    /// Like [`UiWorker::submit`], but gives up when `token` is cancelled.
    ///
    /// A queued unit is skipped entirely. A running unit cannot be aborted;
    /// the caller is released with `Cancelled` once it returns.
    pub async fn submit_with_cancel<F, R>(
        &self,
        work: F,
        token: CancellationToken,
    ) -> Result<R, AutomationError>
    where
        F: FnOnce() -> Result<R, AutomationError> + Send + 'static,
        R: Send + 'static,
    {
        if self.is_worker_thread() {
            return run_guarded(work);
        }
        if token.is_cancelled() {
            return Err(AutomationError::Cancelled(
                "cancelled before submission".to_string(),
            ));
        }

        let (tx, mut rx) = oneshot::channel();
        let state = self.enqueue(work, move |result| {
            let _ = tx.send(result);
        })?;

        tokio::select! {
            biased;
            result = &mut rx => result.unwrap_or_else(|_| Err(worker_gone())),
            _ = token.cancelled() => {
                if state
                    .compare_exchange(QUEUED, CANCELLED, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
                {
                    debug!("unit cancelled before it started");
                    Err(AutomationError::Cancelled("cancelled before start".to_string()))
                } else {
                    let _ = rx.await;
                    debug!("unit cancelled while running; provider call completed");
                    Err(AutomationError::Cancelled("cancelled while running".to_string()))
                }
            }
        }
    }

    /// Blocking variant for synchronous callers. Must not be called from an
    /// async task that the worker's result depends on.
    pub fn run_blocking<F, R>(&self, work: F) -> Result<R, AutomationError>
    where
        F: FnOnce() -> Result<R, AutomationError> + Send + 'static,
        R: Send + 'static,
    {
        if self.is_worker_thread() {
            return run_guarded(work);
        }
        let (tx, rx) = mpsc::sync_channel(1);
        self.enqueue(work, move |result| {
            let _ = tx.send(result);
        })?;
        rx.recv().unwrap_or_else(|_| Err(worker_gone()))
    }

    /// Queues a unit and returns its shared state cell.
    fn enqueue<F, R, D>(&self, work: F, deliver: D) -> Result<Arc<AtomicU8>, AutomationError>
    where
        F: FnOnce() -> Result<R, AutomationError> + Send + 'static,
        R: Send + 'static,
        D: FnOnce(Result<R, AutomationError>) + Send + 'static,
    {
        let state = Arc::new(AtomicU8::new(QUEUED));
        let unit = Unit {
            state: Arc::clone(&state),
            job: Box::new(move || deliver(run_guarded(work))),
        };
        self.shared.sender.send(unit).map_err(|_| worker_gone())?;
        Ok(state)
    }
}

fn worker_gone() -> AutomationError {
    AutomationError::Internal("UI worker is no longer running".to_string())
}

fn run_guarded<F, R>(work: F) -> Result<R, AutomationError>
where
    F: FnOnce() -> Result<R, AutomationError>,
{
    catch_unwind(AssertUnwindSafe(work)).unwrap_or_else(|payload| {
        let message = panic_message(payload.as_ref());
        error!("panic on UI worker: {}", message);
        Err(AutomationError::Internal(format!(
            "panic on UI worker: {message}"
        )))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
