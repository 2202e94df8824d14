//! Single-flight FIFO task runner.
//!
//! At most one task runs at a time and tasks run in push order. A task that
//! fails or panics is logged and counted; the next task still runs.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::observability::QUEUE_TASK_FAILURES_TOTAL;

pub type TaskFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'static>>;
type Task = Box<dyn FnOnce() -> TaskFuture + Send + 'static>;

#[derive(Default)]
struct QueueState {
    tasks: VecDeque<Task>,
    running: bool,
}

#[derive(Clone)]
pub struct SerializedWorkQueue {
    label: Arc<str>,
    state: Arc<Mutex<QueueState>>,
    idle: Arc<Notify>,
}

impl SerializedWorkQueue {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: Arc::from(label.into()),
            state: Arc::new(Mutex::new(QueueState::default())),
            idle: Arc::new(Notify::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // No user code runs under this lock, so a poisoned guard is still consistent.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append `task`. The closure is invoked only when its turn comes, so it
    /// sees the state of the world at run time. When the queue was idle the
    /// drain loop is spawned; nothing runs inside `push` itself.
    pub fn push<F, Fut>(&self, task: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let task: Task = Box::new(move || Box::pin(task()));
        let start = {
            let mut state = self.lock();
            state.tasks.push_back(task);
            let start = !state.running;
            state.running = true;
            start
        };
        if start {
            debug!(queue = %self.label, "starting drain loop");
            tokio::spawn(self.clone().drain());
        }
    }

    /// True when no task is queued or running.
    pub fn is_empty(&self) -> bool {
        let state = self.lock();
        state.tasks.is_empty() && !state.running
    }

    /// Tasks waiting behind the running one.
    pub fn queued(&self) -> usize {
        self.lock().tasks.len()
    }

    /// Resolve once the queue has drained.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_empty() {
                return;
            }
            notified.await;
        }
    }

    async fn drain(self) {
        loop {
            let task = {
                let mut state = self.lock();
                match state.tasks.pop_front() {
                    Some(task) => task,
                    None => {
                        state.running = false;
                        break;
                    }
                }
            };

            // Own task so a panic is contained like an error.
            match tokio::spawn(async move { task().await }).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    QUEUE_TASK_FAILURES_TOTAL.inc();
                    warn!(queue = %self.label, error = %e, "queued task failed");
                }
                Err(e) => {
                    QUEUE_TASK_FAILURES_TOTAL.inc();
                    warn!(queue = %self.label, error = %e, "queued task panicked");
                }
            }

            tokio::task::yield_now().await;
        }
        self.idle.notify_waiters();
        debug!(queue = %self.label, "queue drained");
    }
}
