//! Error classification for jobs and processor lifecycle.

use std::time::Duration;

use mediaproxy_core::error::CoreError;
use mediaproxy_core::ffmpeg::FfmpegError;

/// Coarse class of a [`JobError`], used to pick the response status at the
/// HTTP boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The job was never enqueued.
    Admission,
    /// The payload or its options were rejected by the capability.
    Input,
    /// The capability or the engine failed while handling a valid job.
    Transform,
    /// The caller's deadline elapsed first.
    Timeout,
}

/// Outcome of a job that did not produce a value.
///
/// Input and transform errors are recorded in the job's
/// [`ResultFuture`](crate::ResultFuture) and reach only the submitter.
/// [`JobError::Closed`] is returned synchronously from `submit`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    #[error("processor is closed")]
    Closed,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("input too large: {0}")]
    InputTooLarge(String),

    #[error("transform failed: {0}")]
    Transform(String),

    #[error("processor stopped before the job ran")]
    Stopped,

    #[error("job was cancelled")]
    Cancelled,

    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

impl JobError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Closed => ErrorClass::Admission,
            Self::InvalidInput(_) | Self::InputTooLarge(_) => ErrorClass::Input,
            Self::Transform(_) | Self::Stopped | Self::Cancelled => ErrorClass::Transform,
            Self::Timeout(_) => ErrorClass::Timeout,
        }
    }
}

impl From<CoreError> for JobError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InputTooLarge { .. } => Self::InputTooLarge(err.to_string()),
            CoreError::Validation(msg) => Self::InvalidInput(msg),
            other => Self::Transform(other.to_string()),
        }
    }
}

impl From<FfmpegError> for JobError {
    fn from(err: FfmpegError) -> Self {
        Self::Transform(err.to_string())
    }
}

/// Errors raised while configuring or starting a processor.
#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    #[error("invalid processor configuration: {0}")]
    InvalidConfig(String),

    #[error("processor already started")]
    AlreadyStarted,

    #[error("processor is shut down")]
    Closed,
}
