/// Bounded background worker for best-effort cache writes
///
/// Cache warms and invalidations that must not block or fail the triggering
/// request go through this queue instead of detached spawned tasks: the
/// queue is bounded, every job runs under its own timeout, failures are
/// logged rather than silently dropped, and workers drain and exit when the
/// last handle is dropped so nothing outlives process shutdown.
use crate::config::WorkerConfig;
use crate::error::CoreResult;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type CacheJob = Pin<Box<dyn Future<Output = CoreResult<()>> + Send + 'static>>;

struct Job {
    label: &'static str,
    fut: CacheJob,
}

/// Submission handle. Cloned into every repository that needs best-effort
/// cache writes; workers stop once all clones are dropped.
#[derive(Clone)]
pub struct CacheWriter {
    tx: mpsc::Sender<Job>,
}

/// Join handle for the worker tasks
pub struct CacheWriterHandle {
    workers: Vec<JoinHandle<()>>,
}

impl CacheWriter {
    /// Spawn the worker pool
    pub fn spawn(config: &WorkerConfig) -> (CacheWriter, CacheWriterHandle) {
        let (tx, rx) = mpsc::channel::<Job>(config.queue_capacity);
        let rx = Arc::new(Mutex::new(rx));
        let timeout = Duration::from_secs(config.write_timeout);

        let mut workers = Vec::with_capacity(config.workers);
        for worker_id in 0..config.workers {
            let rx = Arc::clone(&rx);
            workers.push(tokio::spawn(async move {
                loop {
                    let job = rx.lock().await.recv().await;
                    let Some(job) = job else {
                        break;
                    };
                    match tokio::time::timeout(timeout, job.fut).await {
                        Ok(Ok(())) => debug!(worker_id, job = job.label, "cache write done"),
                        Ok(Err(e)) => warn!(worker_id, job = job.label, "cache write failed: {e}"),
                        Err(_) => warn!(worker_id, job = job.label, "cache write timed out"),
                    }
                }
                debug!(worker_id, "cache writer stopping");
            }));
        }
        info!(workers = config.workers, capacity = config.queue_capacity, "cache writer started");

        (CacheWriter { tx }, CacheWriterHandle { workers })
    }

    /// Enqueue a best-effort cache write.
    ///
    /// Never blocks the caller: when the queue is full or closed the job is
    /// dropped with a log line. The cache stays advisory either way.
    pub fn submit<F>(&self, label: &'static str, fut: F)
    where
        F: Future<Output = CoreResult<()>> + Send + 'static,
    {
        let job = Job {
            label,
            fut: Box::pin(fut),
        };
        if let Err(e) = self.tx.try_send(job) {
            let reason = match e {
                mpsc::error::TrySendError::Full(_) => "queue full",
                mpsc::error::TrySendError::Closed(_) => "queue closed",
            };
            warn!(job = label, "cache write dropped: {reason}");
        }
    }
}

impl CacheWriterHandle {
    /// Wait for every worker to drain and exit. Workers only finish after
    /// all `CacheWriter` clones are dropped.
    pub async fn join(self) {
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}
