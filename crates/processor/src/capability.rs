//! The seam between the engine and a job kind.

use std::future::Future;

use bytes::Bytes;

use crate::error::JobError;

/// Per-worker mutable scratch state.
///
/// A context is owned by exactly one worker for the worker's whole
/// lifetime and is reset after every job, successful or not.
pub trait TransformContext: Send + 'static {
    /// Clear all job-specific state so the next job starts clean.
    fn reset(&mut self);
}

/// A job-kind-specific transform run by the processor's workers.
///
/// The engine knows nothing about option fields; a `None` option is valid
/// and means the capability derives its own defaults.
pub trait Capability: Send + Sync + 'static {
    /// Options accepted by [`transform`](Capability::transform).
    type Options: Send + Sync + 'static;

    /// Scratch state owned by each worker.
    type Context: TransformContext;

    /// Short name used in logs and health output.
    const KIND: &'static str;

    /// Build one context. Called once per worker when the processor is
    /// constructed.
    fn new_context(&self) -> Self::Context;

    /// Transform `payload` into an output buffer.
    fn transform(
        &self,
        payload: &Bytes,
        options: Option<&Self::Options>,
        context: &mut Self::Context,
    ) -> impl Future<Output = Result<Bytes, JobError>> + Send;
}
