use crate::services::upload::MediaPipeline;
use crate::services::video::{EncoderLocator, FfmpegEncoder, VideoEncoder};
use crate::{Config, Database};
use anyhow::Result;
use std::sync::Arc;

pub struct AppState {
    pub config: Config,
    pub pipeline: MediaPipeline,
}

impl AppState {
    /// Builds the state with the ffmpeg-backed encoder. The encoder binary is
    /// probed once here for diagnostics; each encode resolves it again.
    pub fn new(config: Config, db: Database) -> Result<Self> {
        let locator = EncoderLocator::new(&config.video.encoder_paths);
        match locator.locate() {
            Ok(path) => tracing::info!("Video encoder found at {}", path.display()),
            Err(e) => tracing::warn!("{}; video uploads will fail until it is installed", e),
        }
        Self::with_encoder(config, db, Arc::new(FfmpegEncoder::new(locator)))
    }

    pub fn with_encoder(
        config: Config,
        db: Database,
        encoder: Arc<dyn VideoEncoder>,
    ) -> Result<Self> {
        let pipeline = MediaPipeline::from_config(&config, db, encoder)?;
        Ok(Self { config, pipeline })
    }

    pub fn db(&self) -> &Database {
        self.pipeline.db()
    }
}
