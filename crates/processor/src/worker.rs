//! Worker loop: one task per configured worker, one context per task.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::capability::{Capability, TransformContext};
use crate::error::JobError;
use crate::job::Job;

/// Queue receiver shared by all workers of a processor. Each job is
/// received by exactly one worker.
pub(crate) type SharedReceiver<O> = Arc<Mutex<mpsc::Receiver<Job<O>>>>;

pub(crate) struct Worker<C: Capability> {
    pub(crate) id: usize,
    pub(crate) capability: Arc<C>,
    pub(crate) receiver: SharedReceiver<C::Options>,
    pub(crate) cancel: CancellationToken,
    pub(crate) in_flight: Arc<AtomicUsize>,
}

impl<C: Capability> Worker<C> {
    /// Process jobs until the processor is cancelled or the queue closes,
    /// then hand the context back for release.
    ///
    /// Cancellation is only observed between jobs; a dequeued job always
    /// runs to completion.
    pub(crate) async fn run(self, mut context: C::Context) -> C::Context {
        tracing::debug!(kind = C::KIND, worker = self.id, "Worker started");

        loop {
            let job = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                job = self.next_job() => match job {
                    Some(job) => job,
                    None => break,
                },
            };
            self.process(job, &mut context).await;
        }

        tracing::debug!(kind = C::KIND, worker = self.id, "Worker stopped");
        context
    }

    async fn next_job(&self) -> Option<Job<C::Options>> {
        let mut receiver = self.receiver.lock().await;
        receiver.recv().await
    }

    async fn process(&self, job: Job<C::Options>, context: &mut C::Context) {
        let queue_ms = job.submitted_at().elapsed().as_millis() as u64;
        let (id, payload, options, completer) = job.into_parts();
        let span = tracing::debug_span!("job", job_id = %id, kind = C::KIND, worker = self.id);

        async {
            self.in_flight.fetch_add(1, Ordering::SeqCst);
            let started = Instant::now();

            let outcome = AssertUnwindSafe(self.capability.transform(
                &payload,
                options.as_ref(),
                context,
            ))
            .catch_unwind()
            .await;

            context.reset();
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            let elapsed_ms = started.elapsed().as_millis() as u64;

            if completer.is_abandoned() {
                tracing::debug!(elapsed_ms, "Caller stopped waiting, result discarded");
            }

            match outcome {
                Ok(Ok(output)) => {
                    tracing::debug!(elapsed_ms, queue_ms, bytes = output.len(), "Job completed");
                    completer.complete(output);
                }
                Ok(Err(e)) => {
                    tracing::warn!(elapsed_ms, queue_ms, error = %e, "Job failed");
                    completer.fail(e);
                }
                Err(_panic) => {
                    tracing::error!(elapsed_ms, queue_ms, "Capability panicked");
                    completer.fail(JobError::Transform("capability panicked".into()));
                }
            }
        }
        .instrument(span)
        .await
    }
}
