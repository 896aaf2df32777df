use std::{
    future::{Future, IntoFuture},
    pin::Pin,
    sync::Arc,
};

use tracing::trace;

use super::{CellRef, Inner};
use crate::{context::TaskContext, error::QueueError, wait::Outcome};

/// Handle to the outcome of one submitted task.
///
/// Await it (or call [`Wait::wait`]) to get the handler's result.
/// Dropping it without awaiting gives the task up: if no worker has claimed it yet,
/// it is never run.
pub struct Wait<T, R, E> {
    cell: Option<CellRef<T, R, E>>,
    ctx: TaskContext,
    inner: Arc<Inner<T, R, E>>,
}

impl<T, R, E> Wait<T, R, E> {
    pub(super) fn new(
        cell: CellRef<T, R, E>,
        ctx: TaskContext,
        inner: Arc<Inner<T, R, E>>,
    ) -> Self {
        Self {
            cell: Some(cell),
            ctx,
            inner,
        }
    }

    /// Waits until the task completes, its context is done, or the queue closes.
    ///
    /// If the context or the queue ends first but a worker has already claimed the task,
    /// the handler's real outcome is still awaited and returned.
    pub async fn wait(mut self) -> Result<R, QueueError<E>> {
        let Some(cell) = self.cell.clone() else {
            return Err(QueueError::Closed);
        };

        let outcome = tokio::select! {
            biased;
            _ = cell.completed() => cell.take_outcome(),
            _ = self.inner.shutdown.cancelled() => give_up(&cell, QueueError::Closed).await,
            err = self.ctx.done() => give_up(&cell, QueueError::Context(err)).await,
        };

        self.cell = None;
        self.inner.pool.release(cell);

        // A completed cell always carries an outcome.
        outcome.unwrap_or(Err(QueueError::Closed))
    }
}

async fn give_up<T, R, E>(cell: &CellRef<T, R, E>, reason: QueueError<E>) -> Option<Outcome<R, E>> {
    if cell.try_cancel() {
        trace!("task canceled before any worker claimed it");
        return Some(Err(reason));
    }
    cell.completed().await;
    cell.take_outcome()
}

impl<T, R, E> Drop for Wait<T, R, E> {
    fn drop(&mut self) {
        if let Some(cell) = self.cell.take() {
            if cell.try_cancel() {
                trace!("wait handle dropped; task given up");
            }
            self.inner.pool.release(cell);
        }
    }
}

impl<T, R, E> IntoFuture for Wait<T, R, E>
where
    T: Send + 'static,
    R: Send + 'static,
    E: Send + 'static,
{
    type Output = Result<R, QueueError<E>>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}
