//! # Wait cell
//!
//! One cell tracks a single submitted task from admission to the moment its producer
//! reads the outcome.
//!
//! Two parties race to move a cell out of [`WaitState::Init`]:
//! - the producer, giving up (`try_cancel`, on context expiry or queue shutdown);
//! - a worker, committing to run the handler (`try_lock`).
//!
//! ## Invariants
//! - Exactly one party wins the transition; the CAS is the only synchronization between them.
//! - A canceled cell is never executed, and the worker that finds it emits nothing.
//! - A locked cell is completed exactly once, and only by the worker that locked it.
//! - `reset` leaves no trace of the previous task, context or outcome.

mod pool;
pub(crate) use pool::CellPool;

use std::sync::{
    Mutex, MutexGuard, PoisonError,
    atomic::{AtomicBool, AtomicU8, Ordering},
};

use tokio::sync::Notify;

use crate::{context::TaskContext, error::QueueError};

pub type Outcome<R, E> = Result<R, QueueError<E>>;

/// Claim state of a [`WaitCell`].
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitState {
    /// Submitted, nobody has claimed it yet.
    Init = 0,
    /// The producer gave up before any worker claimed it.
    Canceled = 1,
    /// A worker claimed it and owns its completion.
    Locked = 2,
}

impl WaitState {
    #[inline]
    fn from_u8(v: u8) -> Self {
        match v {
            1 => WaitState::Canceled,
            2 => WaitState::Locked,
            _ => WaitState::Init,
        }
    }

    /// Returns `true` once either party has won the claim race.
    pub fn is_claimed(&self) -> bool {
        !matches!(self, WaitState::Init)
    }
}

struct Slot<T, R, E> {
    context: Option<TaskContext>,
    task: Option<T>,
    outcome: Option<Outcome<R, E>>,
}

impl<T, R, E> Default for Slot<T, R, E> {
    fn default() -> Self {
        Self {
            context: None,
            task: None,
            outcome: None,
        }
    }
}

/// One-shot, reusable completion cell for a single in-flight task.
pub struct WaitCell<T, R, E> {
    state: AtomicU8,
    done: AtomicBool,
    notify: Notify,
    slot: Mutex<Slot<T, R, E>>,
}

impl<T, R, E> WaitCell<T, R, E> {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(WaitState::Init as u8),
            done: AtomicBool::new(false),
            notify: Notify::new(),
            slot: Mutex::new(Slot::default()),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Slot<T, R, E>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Loads a fresh submission into an idle cell.
    pub fn init(&self, context: TaskContext, task: T) {
        {
            let mut slot = self.slot();
            *slot = Slot {
                context: Some(context),
                task: Some(task),
                outcome: None,
            };
        }
        self.done.store(false, Ordering::Release);
        self.state.store(WaitState::Init as u8, Ordering::Release);
    }

    /// Returns the cell to its zero state.
    pub fn reset(&self) {
        *self.slot() = Slot::default();
        self.done.store(false, Ordering::Release);
        self.state.store(WaitState::Init as u8, Ordering::Release);
    }

    #[inline]
    pub fn state(&self) -> WaitState {
        WaitState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// `Init -> Canceled`. Fails if a worker already locked the cell.
    #[inline]
    pub fn try_cancel(&self) -> bool {
        self.transition(WaitState::Canceled)
    }

    /// `Init -> Locked`. Fails if the producer already canceled the cell.
    #[inline]
    pub fn try_lock(&self) -> bool {
        self.transition(WaitState::Locked)
    }

    fn transition(&self, to: WaitState) -> bool {
        self.state
            .compare_exchange(
                WaitState::Init as u8,
                to as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub fn context(&self) -> Option<TaskContext> {
        self.slot().context.clone()
    }

    /// Moves the task out for execution. Only meaningful after a successful `try_lock`.
    pub fn claim(&self) -> Option<(TaskContext, T)> {
        let mut slot = self.slot();
        let task = slot.task.take()?;
        let context = slot.context.clone().unwrap_or_default();
        Some((context, task))
    }

    /// Stores the outcome and wakes the producer.
    ///
    /// Only the worker that won `try_lock` calls this; a second call is ignored.
    pub fn complete(&self, outcome: Outcome<R, E>) {
        debug_assert_eq!(self.state(), WaitState::Locked);
        {
            let mut slot = self.slot();
            if self.done.load(Ordering::Acquire) || slot.outcome.is_some() {
                return;
            }
            slot.outcome = Some(outcome);
        }
        self.done.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Resolves once [`WaitCell::complete`] has run.
    pub async fn completed(&self) {
        loop {
            // Registered before the flag check, so a concurrent `notify_waiters` is not lost.
            let notified = self.notify.notified();
            if self.is_done() {
                return;
            }
            notified.await;
        }
    }

    pub fn take_outcome(&self) -> Option<Outcome<R, E>> {
        self.slot().outcome.take()
    }
}

impl<T, R, E> Default for WaitCell<T, R, E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;
    use crate::context::ContextError;

    type Cell = WaitCell<String, u32, String>;

    fn loaded(task: &str) -> Cell {
        let cell = Cell::new();
        cell.init(TaskContext::new(), task.to_string());
        cell
    }

    #[test]
    fn fresh_cell_is_init() {
        let cell = loaded("a");
        assert_eq!(cell.state(), WaitState::Init);
        assert!(!cell.state().is_claimed());
        assert!(!cell.is_done());
    }

    #[test]
    fn cancel_blocks_lock() {
        let cell = loaded("a");
        assert!(cell.try_cancel());
        assert!(!cell.try_lock());
        assert_eq!(cell.state(), WaitState::Canceled);
    }

    #[test]
    fn lock_blocks_cancel() {
        let cell = loaded("a");
        assert!(cell.try_lock());
        assert!(!cell.try_cancel());
        assert!(!cell.try_lock());
        assert_eq!(cell.state(), WaitState::Locked);
    }

    #[test]
    fn exactly_one_party_wins_under_contention() {
        for _ in 0..200 {
            let cell = Arc::new(loaded("race"));
            let c1 = Arc::clone(&cell);
            let c2 = Arc::clone(&cell);
            let producer = std::thread::spawn(move || c1.try_cancel());
            let worker = std::thread::spawn(move || c2.try_lock());
            let canceled = producer.join().unwrap();
            let locked = worker.join().unwrap();
            assert!(canceled ^ locked);
        }
    }

    #[test]
    fn claim_moves_the_task_out_once() {
        let cell = loaded("job-1");
        assert!(cell.try_lock());
        let (_, task) = cell.claim().unwrap();
        assert_eq!(task, "job-1");
        assert!(cell.claim().is_none());
    }

    #[test]
    fn complete_stores_first_outcome_only() {
        let cell = loaded("a");
        assert!(cell.try_lock());
        cell.complete(Ok(1));
        cell.complete(Ok(2));
        assert!(cell.is_done());
        assert_eq!(cell.take_outcome().unwrap().unwrap(), 1);
        assert!(cell.take_outcome().is_none());
    }

    #[tokio::test]
    async fn completed_wakes_a_parked_waiter() {
        let cell = Arc::new(loaded("a"));
        let waiter = {
            let cell = Arc::clone(&cell);
            tokio::spawn(async move {
                cell.completed().await;
                cell.take_outcome()
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(cell.try_lock());
        cell.complete(Err(QueueError::Context(ContextError::Canceled)));

        let outcome = waiter.await.unwrap().unwrap();
        assert_eq!(outcome.unwrap_err().context(), Some(ContextError::Canceled));
    }

    #[tokio::test]
    async fn completed_returns_immediately_when_already_done() {
        let cell = loaded("a");
        assert!(cell.try_lock());
        cell.complete(Ok(7));
        cell.completed().await;
        assert_eq!(cell.take_outcome().unwrap().unwrap(), 7);
    }

    #[test]
    fn reset_clears_everything() {
        let cell = loaded("old");
        assert!(cell.try_lock());
        cell.complete(Err(QueueError::Handler("boom".to_string())));
        cell.reset();

        assert_eq!(cell.state(), WaitState::Init);
        assert!(!cell.is_done());
        assert!(cell.context().is_none());
        assert!(cell.take_outcome().is_none());
        assert!(cell.claim().is_none());
    }
}
