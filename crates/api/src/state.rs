use std::sync::Arc;

use mediaproxy_core::ffmpeg::TranscodeCommand;
use mediaproxy_processor::capabilities::{
    AudioCapability, AudioConfig, ImageCapability, ImageConfig, MarkupCapability,
};
use mediaproxy_processor::{Processor, ProcessorError};
use mediaproxy_storage::Storage;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// One processor per job kind.
    pub processors: Arc<Processors>,
    /// Destination for processed outputs.
    pub storage: Arc<dyn Storage>,
}

/// The three engines, built once at startup.
pub struct Processors {
    pub image: Processor<ImageCapability>,
    pub audio: Processor<AudioCapability>,
    pub markup: Processor<MarkupCapability>,
}

impl Processors {
    /// Build all processors from configuration as children of `parent`.
    /// Nothing is started yet.
    pub fn from_config(
        config: &ServerConfig,
        parent: &CancellationToken,
    ) -> Result<Self, ProcessorError> {
        let image = ImageCapability::new(ImageConfig::new(config.image_max_dimension));
        let audio = AudioCapability::new(AudioConfig::new(TranscodeCommand::mp3_128k(
            config.ffmpeg_path.as_str(),
        )));

        Ok(Self {
            image: Processor::with_parent(config.image_processor, image, parent)?,
            audio: Processor::with_parent(config.audio_processor, audio, parent)?,
            markup: Processor::with_parent(config.markup_processor, MarkupCapability, parent)?,
        })
    }

    /// Start every processor's workers.
    pub fn start(&self) -> Result<(), ProcessorError> {
        self.image.start()?;
        self.audio.start()?;
        self.markup.start()?;
        Ok(())
    }

    /// Shut every processor down concurrently and wait for all of them.
    pub async fn shutdown_all(&self) {
        tokio::join!(
            self.image.shutdown(),
            self.audio.shutdown(),
            self.markup.shutdown(),
        );
    }
}
