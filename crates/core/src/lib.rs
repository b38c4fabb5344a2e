//! Domain building blocks shared by the processor engine and the API server.
//!
//! Nothing in here knows about queues, workers or HTTP. The modules are pure
//! functions and small process helpers that are cheap to test in isolation.

pub mod error;
pub mod ffmpeg;
pub mod hashing;
pub mod image_policy;
