//! Audio down-sampling through an external transcoder.

use bytes::Bytes;
use mediaproxy_core::ffmpeg::{
    self, typical_output_bytes, TranscodeCommand, TARGET_BITRATE_KBPS, TYPICAL_AUDIO_MINUTES,
};

use crate::capability::{Capability, TransformContext};
use crate::error::JobError;

/// Extension of stored audio outputs.
pub const OUTPUT_EXTENSION: &str = "mp3";

/// MIME type of stored audio outputs.
pub const OUTPUT_CONTENT_TYPE: &str = "audio/mpeg";

#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Transcoder invocation; must read stdin and write stdout.
    pub command: TranscodeCommand,
    /// Initial capacity of each worker's stdout buffer.
    pub buffer_bytes: usize,
}

impl AudioConfig {
    pub fn new(command: TranscodeCommand) -> Self {
        Self {
            command,
            buffer_bytes: typical_output_bytes(TYPICAL_AUDIO_MINUTES, TARGET_BITRATE_KBPS),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self::new(TranscodeCommand::default())
    }
}

/// Per-worker stdout buffer, sized for a typical track.
#[derive(Debug)]
pub struct AudioContext {
    buffer: Vec<u8>,
    typical: usize,
}

impl TransformContext for AudioContext {
    fn reset(&mut self) {
        self.buffer.clear();
        if self.buffer.capacity() > self.typical * 2 {
            self.buffer.shrink_to(self.typical);
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AudioCapability {
    config: AudioConfig,
}

impl AudioCapability {
    pub fn new(config: AudioConfig) -> Self {
        Self { config }
    }
}

impl Capability for AudioCapability {
    type Options = ();
    type Context = AudioContext;
    const KIND: &'static str = "audio";

    fn new_context(&self) -> AudioContext {
        AudioContext {
            buffer: Vec::with_capacity(self.config.buffer_bytes),
            typical: self.config.buffer_bytes,
        }
    }

    async fn transform(
        &self,
        payload: &Bytes,
        _options: Option<&()>,
        context: &mut AudioContext,
    ) -> Result<Bytes, JobError> {
        if payload.is_empty() {
            return Err(JobError::InvalidInput("empty audio payload".into()));
        }

        ffmpeg::transcode(&self.config.command, payload, &mut context.buffer).await?;
        if context.buffer.is_empty() {
            return Err(JobError::Transform("transcoder produced no output".into()));
        }
        Ok(Bytes::copy_from_slice(&context.buffer))
    }
}
