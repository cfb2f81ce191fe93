//! Bounded FIFO job queue
//!
//! Caps the number of upstream calls in flight. Submitted futures wait in
//! insertion order until a slot frees up.
//!
//! # Design
//!
//! A single dispatcher task owns the pending list and the active count. It
//! receives two kinds of events:
//!
//! 1. `Submit` from [`BoundedQueue::submit`]
//! 2. `Completed` from the wrapper task of every dispatched job
//!
//! Each event is followed by a dispatch check that starts pending jobs while
//! `active < concurrency`. A job that fails or panics still emits `Completed`,
//! so one bad job never stalls the queue.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::{mpsc, oneshot};

/// Queue errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum QueueError {
    #[error("Job queue is full ({0} requests waiting)")]
    Full(usize),

    #[error("Job queue has shut down")]
    Closed,

    #[error("Queued job aborted before producing a result")]
    Aborted,
}

/// Queue configuration
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Maximum jobs running at once
    pub concurrency: usize,
    /// Maximum jobs waiting for a slot
    pub max_pending: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: 2,
            max_pending: 256,
        }
    }
}

/// Point-in-time queue counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct QueueStats {
    pub active: usize,
    pub pending: usize,
    pub concurrency: usize,
}

type Job = BoxFuture<'static, ()>;

enum Event {
    Submit(Job),
    Completed,
}

#[derive(Default)]
struct Counters {
    active: AtomicUsize,
    pending: AtomicUsize,
}

/// Handle to a bounded queue
///
/// Cheap to clone; all clones feed the same dispatcher. The dispatcher exits
/// once every handle is dropped and the remaining jobs have finished.
#[derive(Clone)]
pub struct BoundedQueue {
    submit_tx: mpsc::UnboundedSender<Event>,
    counters: Arc<Counters>,
    config: QueueConfig,
}

impl BoundedQueue {
    /// Create a queue and spawn its dispatcher on the current runtime
    pub fn new(config: QueueConfig) -> Self {
        let config = QueueConfig {
            concurrency: config.concurrency.max(1),
            ..config
        };
        let (submit_tx, submit_rx) = mpsc::unbounded_channel();
        let counters = Arc::new(Counters::default());

        tokio::spawn(dispatch_loop(submit_rx, counters.clone(), config.concurrency));

        tracing::debug!(
            concurrency = config.concurrency,
            max_pending = config.max_pending,
            "job queue started"
        );

        Self {
            submit_tx,
            counters,
            config,
        }
    }

    /// Enqueue `job` and wait for its output
    pub async fn submit<T, F>(&self, job: F) -> Result<T, QueueError>
    where
        T: Send + 'static,
        F: Future<Output = T> + Send + 'static,
    {
        let pending = self.counters.pending.fetch_add(1, Ordering::SeqCst);
        if pending >= self.config.max_pending {
            self.counters.pending.fetch_sub(1, Ordering::SeqCst);
            tracing::warn!(pending, "job queue full, rejecting request");
            return Err(QueueError::Full(pending));
        }

        let (result_tx, result_rx) = oneshot::channel();
        let wrapped: Job = async move {
            // The receiver may have gone away; the job still counts as run
            let _ = result_tx.send(job.await);
        }
        .boxed();

        if self.submit_tx.send(Event::Submit(wrapped)).is_err() {
            self.counters.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(QueueError::Closed);
        }

        result_rx.await.map_err(|_| QueueError::Aborted)
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            active: self.counters.active.load(Ordering::SeqCst),
            pending: self.counters.pending.load(Ordering::SeqCst),
            concurrency: self.config.concurrency,
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }
}

async fn dispatch_loop(
    mut submit_rx: mpsc::UnboundedReceiver<Event>,
    counters: Arc<Counters>,
    concurrency: usize,
) {
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Event>();
    let mut waiting: VecDeque<Job> = VecDeque::new();
    let mut active = 0usize;
    let mut accepting = true;

    loop {
        let event = tokio::select! {
            biased;
            Some(event) = done_rx.recv() => event,
            event = submit_rx.recv(), if accepting => match event {
                Some(event) => event,
                None => {
                    accepting = false;
                    if active == 0 && waiting.is_empty() {
                        break;
                    }
                    continue;
                }
            },
            else => break,
        };

        match event {
            Event::Submit(job) => waiting.push_back(job),
            Event::Completed => {
                active -= 1;
                counters.active.fetch_sub(1, Ordering::SeqCst);
            }
        }

        while active < concurrency {
            let Some(job) = waiting.pop_front() else {
                break;
            };
            active += 1;
            counters.pending.fetch_sub(1, Ordering::SeqCst);
            counters.active.fetch_add(1, Ordering::SeqCst);

            let done_tx = done_tx.clone();
            tokio::spawn(async move {
                // A panicking job surfaces as a JoinError here instead of
                // taking the completion event down with it
                if let Err(e) = tokio::spawn(job).await {
                    tracing::error!("queued job panicked: {}", e);
                }
                let _ = done_tx.send(Event::Completed);
            });
        }

        if !accepting && active == 0 && waiting.is_empty() {
            break;
        }
    }

    tracing::debug!("job queue dispatcher stopped");
}
