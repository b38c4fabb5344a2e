//! Bounded job queue plus a fixed pool of workers for one capability.
//!
//! Lifecycle: [`Processor::new`] builds the queue and one context per
//! worker, [`Processor::start`] spawns the workers and a supervisor task,
//! [`Processor::shutdown`] stops admission, fails queued jobs with
//! [`JobError::Stopped`], lets in-flight jobs finish and releases the
//! contexts.
//!
//! The supervisor is the only place that tears down: it waits for the
//! processor's cancellation token, so cancelling a parent token has the
//! same effect as calling `shutdown` except that nobody waits for it.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::capability::Capability;
use crate::error::{JobError, ProcessorError};
use crate::future::ResultFuture;
use crate::job::Job;
use crate::worker::{SharedReceiver, Worker};

/// Workers per processor when not configured.
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Queue slots per processor when not configured.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Sizing of a processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorConfig {
    /// Number of workers, and therefore of transform contexts.
    pub concurrency: usize,
    /// Jobs that may wait in the queue before `submit` suspends.
    pub queue_capacity: usize,
}

impl ProcessorConfig {
    pub fn new(concurrency: usize, queue_capacity: usize) -> Self {
        Self {
            concurrency,
            queue_capacity,
        }
    }

    fn validate(&self) -> Result<(), ProcessorError> {
        if self.concurrency == 0 {
            return Err(ProcessorError::InvalidConfig(
                "concurrency must be at least 1".into(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(ProcessorError::InvalidConfig(
                "queue capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY, DEFAULT_QUEUE_CAPACITY)
    }
}

/// Start/stop state guarded by one lock so `start` and `shutdown` cannot
/// interleave.
struct Lifecycle<Ctx> {
    /// Present until the workers are spawned (or the processor is shut
    /// down without ever starting).
    contexts: Option<Vec<Ctx>>,
    /// Resolves once the supervisor has joined every worker.
    stopped: Option<Shared<BoxFuture<'static, ()>>>,
}

/// Engine instance for one capability.
pub struct Processor<C: Capability> {
    config: ProcessorConfig,
    capability: Arc<C>,
    sender: mpsc::Sender<Job<C::Options>>,
    receiver: SharedReceiver<C::Options>,
    cancel: CancellationToken,
    in_flight: Arc<AtomicUsize>,
    lifecycle: Mutex<Lifecycle<C::Context>>,
}

impl<C: Capability> Processor<C> {
    /// Build the queue and the worker contexts. Workers are not started.
    pub fn new(config: ProcessorConfig, capability: C) -> Result<Self, ProcessorError> {
        Self::build(config, capability, CancellationToken::new())
    }

    /// Like [`new`](Self::new), but the processor also stops when `parent`
    /// is cancelled.
    pub fn with_parent(
        config: ProcessorConfig,
        capability: C,
        parent: &CancellationToken,
    ) -> Result<Self, ProcessorError> {
        Self::build(config, capability, parent.child_token())
    }

    fn build(
        config: ProcessorConfig,
        capability: C,
        cancel: CancellationToken,
    ) -> Result<Self, ProcessorError> {
        config.validate()?;

        let (sender, receiver) = mpsc::channel(config.queue_capacity);
        let contexts = (0..config.concurrency)
            .map(|_| capability.new_context())
            .collect();

        Ok(Self {
            config,
            capability: Arc::new(capability),
            sender,
            receiver: Arc::new(tokio::sync::Mutex::new(receiver)),
            cancel,
            in_flight: Arc::new(AtomicUsize::new(0)),
            lifecycle: Mutex::new(Lifecycle {
                contexts: Some(contexts),
                stopped: None,
            }),
        })
    }

    /// Spawn the workers and the supervisor. Must be called from within a
    /// tokio runtime.
    pub fn start(&self) -> Result<(), ProcessorError> {
        let mut lifecycle = self.lifecycle();
        if self.cancel.is_cancelled() {
            return Err(ProcessorError::Closed);
        }
        let contexts = lifecycle
            .contexts
            .take()
            .ok_or(ProcessorError::AlreadyStarted)?;

        let workers: Vec<JoinHandle<C::Context>> = contexts
            .into_iter()
            .enumerate()
            .map(|(id, context)| {
                let worker = Worker {
                    id,
                    capability: Arc::clone(&self.capability),
                    receiver: Arc::clone(&self.receiver),
                    cancel: self.cancel.clone(),
                    in_flight: Arc::clone(&self.in_flight),
                };
                tokio::spawn(worker.run(context))
            })
            .collect();

        let supervisor = tokio::spawn(supervise::<C>(
            self.cancel.clone(),
            Arc::clone(&self.receiver),
            workers,
        ));
        lifecycle.stopped = Some(
            async move {
                if let Err(e) = supervisor.await {
                    tracing::error!(kind = C::KIND, error = %e, "Processor supervisor failed");
                }
            }
            .boxed()
            .shared(),
        );

        tracing::info!(
            kind = C::KIND,
            concurrency = self.config.concurrency,
            queue_capacity = self.config.queue_capacity,
            "Processor started",
        );
        Ok(())
    }

    /// Enqueue a job and return the future its outcome will be written to.
    ///
    /// Suspends while the queue is full. Fails with [`JobError::Closed`]
    /// once shutdown has begun; a job is never enqueued after that point.
    pub async fn submit(
        &self,
        payload: Bytes,
        options: Option<C::Options>,
    ) -> Result<ResultFuture, JobError> {
        if self.cancel.is_cancelled() {
            return Err(JobError::Closed);
        }

        let (job, future) = Job::new(payload, options);
        let job_id = job.id();

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(JobError::Closed),
            sent = self.sender.send(job) => sent.map_err(|_| JobError::Closed)?,
        }

        tracing::trace!(kind = C::KIND, %job_id, "Job queued");
        Ok(future)
    }

    /// Stop admission, fail queued jobs, wait for in-flight jobs and
    /// release every context.
    ///
    /// Idempotent; concurrent callers all return once teardown is done.
    pub async fn shutdown(&self) {
        self.cancel.cancel();

        let (unstarted, stopped) = {
            let mut lifecycle = self.lifecycle();
            (lifecycle.contexts.take(), lifecycle.stopped.clone())
        };

        match stopped {
            Some(stopped) => stopped.await,
            None => {
                drop(unstarted);
                let failed = fail_queued(&self.receiver).await;
                tracing::debug!(kind = C::KIND, failed, "Unstarted processor shut down");
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        C::KIND
    }

    pub fn concurrency(&self) -> usize {
        self.config.concurrency
    }

    pub fn queue_capacity(&self) -> usize {
        self.config.queue_capacity
    }

    /// Jobs waiting in the queue.
    pub fn queued(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    /// Jobs a worker is currently transforming.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Whether admission has stopped.
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn capability(&self) -> &C {
        &self.capability
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle<C::Context>> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: Capability> fmt::Debug for Processor<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Processor")
            .field("kind", &C::KIND)
            .field("config", &self.config)
            .field("in_flight", &self.in_flight())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl<C: Capability> Drop for Processor<C> {
    fn drop(&mut self) {
        // Lets the supervisor reap the workers if shutdown was never called.
        self.cancel.cancel();
    }
}

/// Wait for cancellation, then fail queued jobs, join the workers and
/// release their contexts.
async fn supervise<C: Capability>(
    cancel: CancellationToken,
    receiver: SharedReceiver<C::Options>,
    workers: Vec<JoinHandle<C::Context>>,
) {
    cancel.cancelled().await;

    let failed = fail_queued(&receiver).await;
    if failed > 0 {
        tracing::info!(kind = C::KIND, failed, "Failed queued jobs on shutdown");
    }

    let mut released = 0usize;
    for handle in workers {
        match handle.await {
            Ok(context) => {
                drop(context);
                released += 1;
            }
            Err(e) => tracing::error!(kind = C::KIND, error = %e, "Worker task failed"),
        }
    }

    tracing::info!(kind = C::KIND, workers = released, "Processor stopped");
}

/// Close the queue and fail everything still in it with
/// [`JobError::Stopped`]. Returns the number of failed jobs.
async fn fail_queued<O>(receiver: &SharedReceiver<O>) -> usize {
    let mut receiver = receiver.lock().await;
    receiver.close();

    let mut failed = 0;
    while let Some(job) = receiver.recv().await {
        let (job_id, _, _, completer) = job.into_parts();
        tracing::debug!(%job_id, "Job stopped before it ran");
        completer.fail(JobError::Stopped);
        failed += 1;
    }
    failed
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
