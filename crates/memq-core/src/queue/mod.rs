//! # Bounded work queue
//!
//! Producers [`push`](Queue::push) tasks into a fixed-capacity admission buffer and get a
//! [`Wait`] back; workers run [`consume`](Queue::consume) loops that pull tasks in FIFO order
//! and execute a handler.
//!
//! Every blocking point races three things:
//! - the queue's own shutdown signal ([`close`](Queue::close));
//! - the submitter's [`TaskContext`];
//! - the event actually being waited for (a free slot, or the task's completion).

mod handle;
pub use handle::Wait;

mod worker;

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace};

use crate::{
    config::QueueConfig,
    context::TaskContext,
    error::{ConfigError, QueueError},
    task::Task,
    wait::{CellPool, WaitCell},
};

type CellRef<T, R, E> = Arc<WaitCell<T, R, E>>;

pub(crate) struct Inner<T, R, E> {
    capacity: usize,
    shutdown: CancellationToken,
    tx: mpsc::Sender<CellRef<T, R, E>>,
    rx: Mutex<mpsc::Receiver<CellRef<T, R, E>>>,
    pool: CellPool<T, R, E>,
}

/// In-process bounded work queue.
///
/// Cloning is cheap; all clones share the same buffer, pool and shutdown signal.
pub struct Queue<T, R, E> {
    inner: Arc<Inner<T, R, E>>,
}

impl<T, R, E> Clone for Queue<T, R, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, R, E> Queue<T, R, E>
where
    T: Task,
    R: Send + 'static,
    E: Send + 'static,
{
    /// Queue with an admission buffer of `capacity` entries.
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        Self::with_config(QueueConfig::new(capacity))
    }

    pub fn with_config(cfg: QueueConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;

        let (tx, rx) = mpsc::channel(cfg.capacity);
        debug!(
            capacity = cfg.capacity,
            pool_limit = cfg.effective_pool_limit(),
            "queue created"
        );
        Ok(Self {
            inner: Arc::new(Inner {
                capacity: cfg.capacity,
                shutdown: CancellationToken::new(),
                tx,
                rx: Mutex::new(rx),
                pool: CellPool::new(cfg.effective_pool_limit()),
            }),
        })
    }

    /// Submits `task` and returns a handle to its eventual outcome.
    ///
    /// Waits for a free slot in the admission buffer. Fails with [`QueueError::Closed`] if the
    /// queue is (or becomes) closed, or with the context's error if `ctx` is (or becomes) done
    /// first.
    /// A rejected task is not left behind in the queue.
    #[instrument(level = "trace", skip_all, fields(task = %task.key()))]
    pub async fn push(&self, ctx: &TaskContext, task: T) -> Result<Wait<T, R, E>, QueueError<E>> {
        let inner = &self.inner;
        if inner.shutdown.is_cancelled() {
            trace!("admission rejected: queue closed");
            return Err(QueueError::Closed);
        }

        let cell = inner.pool.acquire();
        cell.init(ctx.clone(), task);

        let admitted = tokio::select! {
            biased;
            _ = inner.shutdown.cancelled() => Err(QueueError::Closed),
            err = ctx.done() => Err(QueueError::Context(err)),
            permit = inner.tx.reserve() => permit.map_err(|_| QueueError::Closed),
        };

        match admitted {
            Ok(permit) => {
                permit.send(Arc::clone(&cell));
                trace!("task admitted");
                Ok(Wait::new(cell, ctx.clone(), Arc::clone(inner)))
            }
            Err(err) => {
                debug!(closed = err.is_closed(), "admission rejected");
                inner.pool.release(cell);
                Err(err)
            }
        }
    }

    /// Submits `task` and waits for its outcome.
    pub async fn push_wait(&self, ctx: &TaskContext, task: T) -> Result<R, QueueError<E>> {
        self.push(ctx, task).await?.wait().await
    }
}

impl<T, R, E> Queue<T, R, E> {
    /// Triggers shutdown. Idempotent.
    ///
    /// Blocked producers and waiters are released with [`QueueError::Closed`] and every `consume`
    /// loop returns. Handlers already running are not interrupted and not awaited.
    pub fn close(&self) {
        if !self.inner.shutdown.is_cancelled() {
            info!(pending = self.pending(), "queue closing");
        }
        self.inner.shutdown.cancel();
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Resolves once [`Queue::close`] has been called.
    pub async fn closed(&self) {
        self.inner.shutdown.cancelled().await
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Number of buffer slots currently taken (queued or reserved, not yet claimed by a worker).
    pub fn pending(&self) -> usize {
        self.inner.capacity - self.inner.tx.capacity()
    }
}
