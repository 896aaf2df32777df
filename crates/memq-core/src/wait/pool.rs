use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::WaitCell;

/// Bounded free-list of idle wait cells.
///
/// A cell is only taken back while the caller holds its last reference:
/// a canceled cell still queued in the admission buffer is never reinitialized under a worker.
pub(crate) struct CellPool<T, R, E> {
    idle: Mutex<Vec<Arc<WaitCell<T, R, E>>>>,
    limit: usize,
}

impl<T, R, E> CellPool<T, R, E> {
    pub fn new(limit: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            limit,
        }
    }

    fn idle(&self) -> MutexGuard<'_, Vec<Arc<WaitCell<T, R, E>>>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pops an idle cell or allocates a new one.
    pub fn acquire(&self) -> Arc<WaitCell<T, R, E>> {
        self.idle().pop().unwrap_or_else(|| Arc::new(WaitCell::new()))
    }

    /// Resets and keeps `cell` if it is uniquely owned and the pool has room.
    ///
    /// Returns `true` when the cell was recycled.
    pub fn release(&self, mut cell: Arc<WaitCell<T, R, E>>) -> bool {
        if self.limit == 0 || Arc::get_mut(&mut cell).is_none() {
            return false;
        }
        cell.reset();

        let mut idle = self.idle();
        if idle.len() >= self.limit {
            return false;
        }
        idle.push(cell);
        true
    }

    pub fn idle_len(&self) -> usize {
        self.idle().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{context::TaskContext, wait::WaitState};

    type Pool = CellPool<String, u32, String>;

    #[test]
    fn released_cell_is_reused_clean() {
        let pool = Pool::new(4);
        let cell = pool.acquire();
        cell.init(TaskContext::new(), "first".to_string());
        assert!(cell.try_lock());
        cell.complete(Ok(1));
        let addr = Arc::as_ptr(&cell);

        assert!(pool.release(cell));
        assert_eq!(pool.idle_len(), 1);

        let again = pool.acquire();
        assert_eq!(Arc::as_ptr(&again), addr);
        assert_eq!(again.state(), WaitState::Init);
        assert!(!again.is_done());
        assert!(again.context().is_none());
        assert!(again.take_outcome().is_none());
    }

    #[test]
    fn shared_cell_is_not_recycled() {
        let pool = Pool::new(4);
        let cell = pool.acquire();
        let still_queued = Arc::clone(&cell);

        assert!(!pool.release(cell));
        assert_eq!(pool.idle_len(), 0);
        drop(still_queued);
    }

    #[test]
    fn pool_respects_limit() {
        let pool = Pool::new(1);
        let a = pool.acquire();
        let b = pool.acquire();
        assert!(pool.release(a));
        assert!(!pool.release(b));
        assert_eq!(pool.idle_len(), 1);
    }

    #[test]
    fn zero_limit_disables_pooling() {
        let pool = Pool::new(0);
        assert!(!pool.release(pool.acquire()));
        assert_eq!(pool.idle_len(), 0);
    }
}
