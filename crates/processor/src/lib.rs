//! Bounded concurrent job-processing engine.
//!
//! A [`Processor`] owns a bounded FIFO queue and a fixed set of workers.
//! Callers [`submit`](Processor::submit) a payload and get back a
//! [`ResultFuture`] they can wait on with a deadline. Each worker owns one
//! private transform context for its whole lifetime and resets it after
//! every job.
//!
//! The engine is generic over [`Capability`]; the image, audio and markup
//! transforms in [`capabilities`] are three instantiations of it.

pub mod capabilities;
pub mod capability;
pub mod error;
pub mod future;
pub mod job;
pub mod processor;
mod worker;

pub use capability::{Capability, TransformContext};
pub use error::{ErrorClass, JobError, ProcessorError};
pub use future::{Completer, ResultFuture};
pub use job::{Job, JobId};
pub use processor::{Processor, ProcessorConfig};
