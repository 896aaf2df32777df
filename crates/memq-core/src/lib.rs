//! # memq-core
//!
//! In-process, bounded, generic work queue.
//!
//! Producers submit typed tasks and get back a [`Wait`] handle; a pool of worker loops
//! ([`Queue::consume`]) pulls tasks in FIFO order and runs a caller-supplied handler.
//! Each submission carries its own [`TaskContext`] (cancellation + deadline), independent
//! of the queue's lifecycle ([`Queue::close`]).
//!
//! ```no_run
//! use memq_core::{Queue, TaskContext};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let queue: Queue<String, usize, std::io::Error> = Queue::new(64)?;
//! let workers = queue.spawn_workers(4, |_ctx, task: String| async move { Ok(task.len()) });
//!
//! let len = queue.push_wait(&TaskContext::new(), "hello".to_string()).await?;
//! assert_eq!(len, 5);
//!
//! queue.close();
//! for w in workers {
//!     w.await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub use config::QueueConfig;

pub mod context;
pub use context::{ContextError, TaskContext};

mod error;
pub use error::{ConfigError, QueueError};

pub mod queue;
pub use queue::{Queue, Wait};

mod task;
pub use task::Task;

pub mod wait;
pub use wait::WaitState;

pub mod prelude {
    pub use crate::{ContextError, Queue, QueueConfig, QueueError, Task, TaskContext, Wait};
}
