//! A submitted unit of work.

use std::fmt;
use std::time::Instant;

use bytes::Bytes;
use uuid::Uuid;

use crate::future::{self, Completer, ResultFuture};

/// Identifier assigned at submission, used as a tracing field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Payload, options and the writer half of the job's result.
///
/// The payload and options are fixed at construction. A job is consumed by
/// exactly one worker, or failed during shutdown if it never left the queue.
#[derive(Debug)]
pub struct Job<O> {
    id: JobId,
    payload: Bytes,
    options: Option<O>,
    submitted_at: Instant,
    completer: Completer,
}

impl<O> Job<O> {
    /// Build a job and the future its submitter will wait on.
    pub fn new(payload: Bytes, options: Option<O>) -> (Self, ResultFuture) {
        let (completer, future) = future::channel();
        let job = Self {
            id: JobId::new(),
            payload,
            options,
            submitted_at: Instant::now(),
            completer,
        };
        (job, future)
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn options(&self) -> Option<&O> {
        self.options.as_ref()
    }

    pub fn submitted_at(&self) -> Instant {
        self.submitted_at
    }

    /// Split the job for processing. The completer must be used to
    /// publish the outcome.
    pub fn into_parts(self) -> (JobId, Bytes, Option<O>, Completer) {
        (self.id, self.payload, self.options, self.completer)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::error::JobError;

    #[test]
    fn ids_are_unique() {
        assert_ne!(JobId::new(), JobId::new());
    }

    #[test]
    fn accessors_expose_submitted_values() {
        let (job, _future) = Job::new(Bytes::from_static(b"payload"), Some(7u32));
        assert_eq!(job.payload(), &Bytes::from_static(b"payload"));
        assert_eq!(job.options(), Some(&7));
        assert!(job.submitted_at() <= Instant::now());
    }

    #[test]
    fn completing_parts_resolves_future() {
        let (job, future) = Job::<()>::new(Bytes::from_static(b"in"), None);
        let (_, payload, options, completer) = job.into_parts();
        assert!(options.is_none());

        completer.complete(payload);
        assert_matches!(future.try_outcome(), Some(Ok(ref out)) if out == "in");
    }

    #[test]
    fn dropping_a_job_cancels_its_future() {
        let (job, future) = Job::<()>::new(Bytes::new(), None);
        drop(job);
        assert_matches!(future.try_outcome(), Some(Err(JobError::Cancelled)));
    }
}
