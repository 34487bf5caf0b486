//! Bounded-concurrency task queue.
//!
//! Every batch pushed into a [`TaskQueue`] shares one semaphore, so at most
//! `concurrency` units of work run at a time across all batches. Waiting tasks are
//! admitted in FIFO order (tokio's semaphore is fair). Each task settles into its own
//! [`TaskOutcome`]; a failing task never cancels its siblings.

use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, join_all};
use tokio::sync::Semaphore;

/// The settled result of one queued task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome<T, E> {
    Fulfilled(T),
    Rejected(E),
}

impl<T, E> TaskOutcome<T, E> {
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, TaskOutcome::Fulfilled(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, TaskOutcome::Rejected(_))
    }

    pub fn into_result(self) -> Result<T, E> {
        match self {
            TaskOutcome::Fulfilled(value) => Ok(value),
            TaskOutcome::Rejected(error) => Err(error),
        }
    }
}

impl<T, E> From<Result<T, E>> for TaskOutcome<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => TaskOutcome::Fulfilled(value),
            Err(error) => TaskOutcome::Rejected(error),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("Task queue `{0}` is closed")]
pub struct QueueClosed(pub String);

type Worker<A, T, E> = Arc<dyn Fn(A) -> BoxFuture<'static, Result<T, E>> + Send + Sync>;

pub struct TaskQueue<A, T, E> {
    name: String,
    concurrency: usize,
    semaphore: Arc<Semaphore>,
    worker: Worker<A, T, E>,
}

impl<A, T, E> TaskQueue<A, T, E>
where
    A: Send + 'static,
    T: Send + 'static,
    E: From<QueueClosed> + Send + 'static,
{
    /// `concurrency` is clamped to at least one running task.
    pub fn new<F, Fut>(name: impl Into<String>, concurrency: usize, worker: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let concurrency = concurrency.max(1);
        Self {
            name: name.into(),
            concurrency,
            semaphore: Arc::new(Semaphore::new(concurrency)),
            worker: Arc::new(move |args| worker(args).boxed()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run a batch and wait for every task in it to settle.
    ///
    /// Outcomes come back in submission order regardless of completion order.
    pub async fn push(&self, batch: Vec<A>) -> Vec<TaskOutcome<T, E>> {
        log::debug!(
            "Queue '{}': pushing batch of {} tasks (concurrency {})",
            self.name,
            batch.len(),
            self.concurrency
        );

        let tasks = batch.into_iter().map(|args| {
            let semaphore = &self.semaphore;
            let worker = &self.worker;
            async move {
                let Ok(_permit) = semaphore.acquire().await else {
                    return TaskOutcome::Rejected(QueueClosed(self.name.clone()).into());
                };
                TaskOutcome::from(worker(args).await)
            }
        });

        let outcomes = join_all(tasks).await;
        log::debug!(
            "Queue '{}': batch settled ({} rejected)",
            self.name,
            outcomes.iter().filter(|o| o.is_rejected()).count()
        );
        outcomes
    }
}
