use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, error, info, warn};
use tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::WorkerError;
use crate::pipeline::Pipeline;

pub const UNEXPECTED_ERROR_MESSAGE: &str = "Unexpected error";
pub const CANCELLED_MESSAGE: &str = "Processing cancelled: server shutting down";

type SharedReceiver = Arc<tokio::sync::Mutex<Receiver<String>>>;

/// Fixed set of async workers pulling job ids off a bounded queue.
pub struct WorkerPool {
    sender: Sender<String>,
    receiver: SharedReceiver,
    depth: Arc<AtomicUsize>,
    shutdown: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
    pipeline: Arc<Pipeline>,
}

impl WorkerPool {
    /// Starts `worker_count` workers on the current tokio runtime.
    ///
    /// # Panics
    /// Panics if `worker_count` or `queue_capacity` is 0.
    pub fn new(pipeline: Arc<Pipeline>, worker_count: usize, queue_capacity: usize) -> Self {
        assert!(worker_count > 0, "worker_count must be > 0");
        let (sender, receiver) = mpsc::channel::<String>(queue_capacity);
        let receiver: SharedReceiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let depth = Arc::new(AtomicUsize::new(0));
        let shutdown = CancellationToken::new();

        let workers = (0..worker_count)
            .map(|worker_id| {
                tokio::spawn(run_worker(
                    worker_id,
                    Arc::clone(&receiver),
                    Arc::clone(&depth),
                    shutdown.clone(),
                    Arc::clone(&pipeline),
                ))
            })
            .collect();

        info!(
            "Started {} workers (queue capacity {})",
            worker_count, queue_capacity
        );

        Self {
            sender,
            receiver,
            depth,
            shutdown,
            workers: Mutex::new(workers),
            worker_count,
            pipeline,
        }
    }

    /// Queues a job without waiting. Fails with `QueueFull` when the
    /// queue is at capacity.
    pub fn submit(&self, job_id: String) -> Result<(), WorkerError> {
        if self.shutdown.is_cancelled() {
            return Err(WorkerError::ChannelClosed);
        }

        self.depth.fetch_add(1, Ordering::SeqCst);
        match self.sender.try_send(job_id) {
            Ok(()) => {
                debug!("Job queued (depth {})", self.queue_depth());
                Ok(())
            }
            Err(e) => {
                self.depth.fetch_sub(1, Ordering::SeqCst);
                match e {
                    TrySendError::Full(id) => {
                        warn!("Queue full, rejecting job {}", id);
                        Err(WorkerError::QueueFull)
                    }
                    TrySendError::Closed(_) => Err(WorkerError::ChannelClosed),
                }
            }
        }
    }

    /// Jobs accepted but not yet picked up by a worker.
    pub fn queue_depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    pub fn workers(&self) -> usize {
        self.worker_count
    }

    /// Stops accepting work, fails every job still queued, and waits for
    /// in-flight jobs to finish.
    pub async fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.cancel();

        let cancelled = {
            let mut receiver = self.receiver.lock().await;
            receiver.close();
            let mut ids = Vec::new();
            while let Ok(id) = receiver.try_recv() {
                self.depth.fetch_sub(1, Ordering::SeqCst);
                ids.push(id);
            }
            ids
        };
        for id in &cancelled {
            if let Err(e) = self.pipeline.fail(id, CANCELLED_MESSAGE).await {
                warn!("Could not mark queued job {} as cancelled: {}", id, e);
            }
        }
        if !cancelled.is_empty() {
            info!("Cancelled {} queued jobs", cancelled.len());
        }

        let handles = {
            let mut workers = self.workers.lock().unwrap_or_else(|poisoned| {
                warn!("Worker handle lock was poisoned, recovering");
                poisoned.into_inner()
            });
            std::mem::take(&mut *workers)
        };
        for (i, handle) in handles.into_iter().enumerate() {
            if let Err(e) = handle.await {
                error!("Worker {} panicked: {}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }
}

async fn run_worker(
    worker_id: usize,
    receiver: SharedReceiver,
    depth: Arc<AtomicUsize>,
    shutdown: CancellationToken,
    pipeline: Arc<Pipeline>,
) {
    debug!("Worker {} started", worker_id);

    loop {
        let next = tokio::select! {
            biased;
            _ = shutdown.cancelled() => None,
            job = async { receiver.lock().await.recv().await } => job,
        };
        let Some(job_id) = next else {
            break;
        };
        depth.fetch_sub(1, Ordering::SeqCst);
        debug!(
            "Worker {} processing job {} (depth {})",
            worker_id,
            job_id,
            depth.load(Ordering::SeqCst)
        );

        // Run in a child task so a panic in a stage only takes down this job.
        let task = tokio::spawn({
            let pipeline = Arc::clone(&pipeline);
            let job_id = job_id.clone();
            async move { pipeline.run(&job_id).await }
        });

        match task.await {
            Ok(Ok(record)) => {
                debug!(
                    "Worker {} finished job {} with status {}",
                    worker_id, job_id, record.status
                );
            }
            Ok(Err(e)) => {
                error!("Worker {} could not record job {}: {}", worker_id, job_id, e);
            }
            Err(e) => {
                error!("Worker {} job {} aborted: {}", worker_id, job_id, e);
                if let Err(e) = pipeline.fail(&job_id, UNEXPECTED_ERROR_MESSAGE).await {
                    warn!("Could not mark job {} as failed: {}", job_id, e);
                }
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}
