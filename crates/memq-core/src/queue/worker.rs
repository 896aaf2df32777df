use std::{any::Any, future::Future};

use tokio::task::{JoinError, JoinHandle};
use tracing::{Instrument, debug, debug_span, error, info_span, trace, warn};

use super::{CellRef, Queue};
use crate::{context::TaskContext, error::QueueError, task::Task, wait::Outcome};

impl<T, R, E> Queue<T, R, E>
where
    T: Task,
    R: Send + 'static,
    E: Send + 'static,
{
    /// Worker loop: pulls tasks in admission order and runs `handler` on each.
    ///
    /// Returns once the queue is closed. Run it on N tasks concurrently for a pool of N workers.
    pub async fn consume<H, Fut>(&self, handler: H)
    where
        H: Fn(TaskContext, T) -> Fut,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        debug!("worker started");
        loop {
            let next = tokio::select! {
                biased;
                _ = self.inner.shutdown.cancelled() => None,
                cell = self.next() => cell,
            };
            let Some(cell) = next else {
                break;
            };
            self.execute(cell, &handler).await;
        }
        debug!("worker stopped");
    }

    /// Spawns `workers` [`consume`](Queue::consume) loops on the current runtime.
    ///
    /// Await the returned handles after [`close`](Queue::close) to know every loop has exited.
    pub fn spawn_workers<H, Fut>(&self, workers: usize, handler: H) -> Vec<JoinHandle<()>>
    where
        H: Fn(TaskContext, T) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        (0..workers)
            .map(|id| {
                let queue = self.clone();
                let handler = handler.clone();
                let span = info_span!("worker", id);
                tokio::spawn(async move { queue.consume(handler).await }.instrument(span))
            })
            .collect()
    }

    pub(super) async fn next(&self) -> Option<CellRef<T, R, E>> {
        self.inner.rx.lock().await.recv().await
    }

    async fn execute<H, Fut>(&self, cell: CellRef<T, R, E>, handler: &H)
    where
        H: Fn(TaskContext, T) -> Fut,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        if !cell.try_lock() {
            trace!("task canceled by its producer; skipped");
            return;
        }
        let completion = Completion { cell };

        let Some((ctx, task)) = completion.cell.claim() else {
            completion.finish(Err(QueueError::Closed));
            return;
        };
        let span = debug_span!("execute", task = %task.key());

        if self.inner.shutdown.is_cancelled() {
            span.in_scope(|| trace!("queue closed before handler start"));
            completion.finish(Err(QueueError::Closed));
            return;
        }
        if let Some(err) = ctx.err() {
            span.in_scope(|| trace!(%err, "task context done before handler start"));
            completion.finish(Err(QueueError::Context(err)));
            return;
        }

        let work = handler(ctx, task);
        let run = async move {
            let outcome = match tokio::spawn(work.instrument(span.clone())).await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => {
                    span.in_scope(|| warn!("handler returned an error"));
                    Err(QueueError::Handler(e))
                }
                Err(join) if join.is_panic() => {
                    let reason = panic_reason(join);
                    span.in_scope(|| error!(%reason, "handler panicked"));
                    Err(QueueError::Panicked(reason))
                }
                Err(_) => Err(QueueError::Closed),
            };
            completion.finish(outcome);
        };

        // The completion travels with the run task: aborting this worker does not detach
        // the producer from the handler's real outcome.
        if let Err(e) = tokio::spawn(run).await {
            trace!(%e, "run task ended without finishing");
        }
    }
}

/// Completion duty for a locked cell.
///
/// If it is dropped unfinished (the run task was torn down with the runtime),
/// the producer is still released, with [`QueueError::Closed`].
struct Completion<T, R, E> {
    cell: CellRef<T, R, E>,
}

impl<T, R, E> Completion<T, R, E> {
    fn finish(self, outcome: Outcome<R, E>) {
        self.cell.complete(outcome);
    }
}

impl<T, R, E> Drop for Completion<T, R, E> {
    fn drop(&mut self) {
        if !self.cell.is_done() {
            self.cell.complete(Err(QueueError::Closed));
        }
    }
}

fn panic_reason(err: JoinError) -> String {
    match err.try_into_panic() {
        Ok(payload) => payload_message(payload.as_ref()),
        Err(err) => err.to_string(),
    }
}

fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        return (*s).to_string();
    }
    if let Some(s) = payload.downcast_ref::<String>() {
        return s.clone();
    }
    "unknown panic payload".to_string()
}
