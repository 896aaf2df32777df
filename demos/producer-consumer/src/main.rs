use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use tracing::{info, warn};

use memq_core::{Queue, QueueConfig, QueueError, Task, TaskContext};
use memq_observe::{LoggerConfig, logger_init};

const PRODUCERS: usize = 200;
const WORKERS: usize = 16;
const TASK_TIMEOUT: Duration = Duration::from_millis(500);

struct Job {
    key: String,
    producer: usize,
}

impl Task for Job {
    fn key(&self) -> &str {
        &self.key
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logger_init(&LoggerConfig::from_env()?)?;

    let queue: Queue<Job, u64, std::io::Error> = Queue::with_config(QueueConfig::new(1024))?;
    info!(capacity = queue.capacity(), "queue ready");

    let handled = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&handled);
    let workers = queue.spawn_workers(WORKERS, move |ctx: TaskContext, job: Job| {
        let counter = Arc::clone(&counter);
        async move {
            // Simulated work: 20..40ms, abandoned early if the submitter gives up.
            let cost = Duration::from_millis(20 + (job.producer as u64 % 21));
            tokio::select! {
                _ = tokio::time::sleep(cost) => {}
                err = ctx.done() => {
                    return Err(std::io::Error::new(std::io::ErrorKind::TimedOut, err));
                }
            }
            Ok(counter.fetch_add(1, Ordering::Relaxed) as u64)
        }
    });
    info!(workers = WORKERS, "workers started");

    let mut producers = Vec::with_capacity(PRODUCERS);
    for producer in 0..PRODUCERS {
        let queue = queue.clone();
        producers.push(tokio::spawn(async move {
            let job = Job {
                key: uuid::Uuid::new_v4().to_string(),
                producer,
            };
            let ctx = TaskContext::with_timeout(TASK_TIMEOUT);
            match queue.push_wait(&ctx, job).await {
                Ok(seq) => Some(seq),
                Err(QueueError::Context(err)) => {
                    warn!(producer, %err, "task gave up");
                    None
                }
                Err(err) => {
                    warn!(producer, %err, "task failed");
                    None
                }
            }
        }));
    }

    let mut completed = 0usize;
    for p in producers {
        if p.await?.is_some() {
            completed += 1;
        }
    }
    info!(completed, submitted = PRODUCERS, "all producers finished");

    queue.close();
    for w in workers {
        w.await?;
    }
    info!(handled = handled.load(Ordering::Relaxed), "workers drained");
    Ok(())
}
