//! One-shot result handle shared between a submitter and one worker.
//!
//! [`channel`] creates the two halves. The [`Completer`] travels with the
//! job to exactly one worker; the [`ResultFuture`] goes back to the
//! submitter. Every writer method consumes the completer, so a future can
//! never be completed twice. A completer dropped without an outcome records
//! [`JobError::Cancelled`], which guarantees that no waiter blocks forever.

use std::time::Duration;

use bytes::Bytes;
use tokio::sync::watch;

use crate::error::JobError;

type Outcome = Result<Bytes, JobError>;

/// Create a connected completer/future pair.
pub fn channel() -> (Completer, ResultFuture) {
    let (tx, rx) = watch::channel(None);
    (Completer { tx: Some(tx) }, ResultFuture { rx })
}

/// Read side of a job's result.
#[derive(Debug)]
pub struct ResultFuture {
    rx: watch::Receiver<Option<Outcome>>,
}

impl ResultFuture {
    /// Wait until the job completes or `deadline` elapses.
    ///
    /// On timeout the job keeps running in the background; its eventual
    /// outcome is still recorded and visible to later calls. Once complete,
    /// every call returns the same outcome.
    pub async fn wait(&self, deadline: Duration) -> Result<Bytes, JobError> {
        let mut rx = self.rx.clone();
        let waited = tokio::time::timeout(deadline, rx.wait_for(Option::is_some)).await;
        let outcome = match waited {
            Ok(Ok(outcome)) => match outcome.as_ref() {
                Some(outcome) => outcome.clone(),
                None => Err(JobError::Cancelled),
            },
            // The writer vanished without publishing; Completer::drop makes
            // this unreachable in practice.
            Ok(Err(_closed)) => Err(JobError::Cancelled),
            Err(_elapsed) => Err(JobError::Timeout(deadline)),
        };
        outcome
    }

    /// The outcome if the job has completed, without waiting.
    pub fn try_outcome(&self) -> Option<Outcome> {
        self.rx.borrow().clone()
    }

    pub fn is_complete(&self) -> bool {
        self.rx.borrow().is_some()
    }
}

/// Write side of a job's result. Owned by the job, used by one worker.
#[derive(Debug)]
pub struct Completer {
    tx: Option<watch::Sender<Option<Outcome>>>,
}

impl Completer {
    /// Publish the produced buffer.
    pub fn complete(mut self, value: Bytes) {
        self.publish(Ok(value));
    }

    /// Publish a classified failure.
    pub fn fail(mut self, error: JobError) {
        self.publish(Err(error));
    }

    /// Force completion without a value.
    pub fn cancel(self) {
        self.fail(JobError::Cancelled);
    }

    /// Whether the submitter has dropped its [`ResultFuture`].
    pub fn is_abandoned(&self) -> bool {
        self.tx.as_ref().is_none_or(|tx| tx.is_closed())
    }

    fn publish(&mut self, outcome: Outcome) {
        if let Some(tx) = self.tx.take() {
            tx.send_replace(Some(outcome));
        }
    }
}

impl Drop for Completer {
    fn drop(&mut self) {
        self.publish(Err(JobError::Cancelled));
    }
}
