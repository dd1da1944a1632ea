use crate::config::Config;
use crate::error::PipelineResult;
use crate::models::{DownloadStatus, MediaItem, MediaKind, NewMedia};
use crate::services::archive::{self, Archive};
use crate::services::image::ImageTranscoder;
use crate::services::validation::{self, UploadCheck, UploadLimits};
use crate::services::video::{EncodeConstraints, VideoEncoder, VideoTranscoder};
use crate::services::{download_status, media, storage};
use crate::Database;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Longest contributor name kept on a media item.
const MAX_CONTRIBUTOR_NAME_CHARS: usize = 100;

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub event_id: i64,
    pub album_ids: Vec<i64>,
    pub kind: MediaKind,
    /// Client-side file name; only its extension is used.
    pub file_name: Option<String>,
    pub data: Vec<u8>,
    pub is_public: bool,
    pub contributor_name: Option<String>,
    pub duration_secs: Option<f64>,
}

/// Upload and download flows wired together: validator, transcoders, media
/// store, archive builder and download tracking.
#[derive(Clone)]
pub struct MediaPipeline {
    db: Database,
    upload_root: PathBuf,
    limits: UploadLimits,
    images: ImageTranscoder,
    videos: VideoTranscoder,
}

impl MediaPipeline {
    pub fn new(
        db: Database,
        upload_root: PathBuf,
        limits: UploadLimits,
        images: ImageTranscoder,
        videos: VideoTranscoder,
    ) -> Self {
        Self {
            db,
            upload_root,
            limits,
            images,
            videos,
        }
    }

    pub fn from_config(
        config: &Config,
        db: Database,
        encoder: Arc<dyn VideoEncoder>,
    ) -> anyhow::Result<Self> {
        let limits = UploadLimits {
            max_video_duration_secs: config.video.max_duration_secs,
            max_upload_bytes: config.media.max_upload_bytes()?,
        };
        Ok(Self::new(
            db,
            config.media.upload_root(),
            limits,
            ImageTranscoder::new(&config.image),
            VideoTranscoder::new(encoder, EncodeConstraints::from_config(&config.video)),
        ))
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn upload_root(&self) -> &Path {
        &self.upload_root
    }

    pub fn limits(&self) -> &UploadLimits {
        &self.limits
    }

    /// Validates, transcodes and records one upload.
    ///
    /// No media row exists unless transcoding succeeded, and no transcoded
    /// file survives if recording the row fails. The work runs on its own
    /// task, so a caller that goes away mid-upload abandons the result but
    /// never leaves a transcoded file without its record.
    pub async fn upload(&self, request: UploadRequest) -> PipelineResult<MediaItem> {
        let pipeline = self.clone();
        tokio::spawn(async move { pipeline.run_upload(request).await }).await?
    }

    async fn run_upload(&self, request: UploadRequest) -> PipelineResult<MediaItem> {
        validation::validate_upload(
            &self.db,
            &self.limits,
            &UploadCheck {
                event_id: request.event_id,
                album_ids: &request.album_ids,
                kind: request.kind,
                duration_secs: request.duration_secs,
                data: &request.data,
            },
        )?;

        let extension = request
            .file_name
            .as_deref()
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase);

        let stored_path = match request.kind {
            MediaKind::Image => {
                let images = self.images.clone();
                let root = self.upload_root.clone();
                let data = request.data;
                tokio::task::spawn_blocking(move || images.transcode_to_file(&data, &root)).await??
            }
            MediaKind::Video => {
                self.videos
                    .transcode_to_file(&request.data, &self.upload_root, extension.as_deref())
                    .await?
            }
        };

        let new = NewMedia {
            event_id: request.event_id,
            kind: request.kind,
            stored_path: stored_path.clone(),
            is_public: request.is_public,
            contributor_name: clean_contributor_name(request.contributor_name.as_deref()),
            duration_secs: request.duration_secs,
            album_ids: request.album_ids,
        };

        match media::create_media(&self.db, &new) {
            Ok(item) => {
                tracing::info!(
                    media_id = item.id,
                    event_id = item.event_id,
                    kind = %item.kind,
                    "Stored upload {}",
                    item.stored_path
                );
                Ok(item)
            }
            Err(e) => {
                if let Ok(path) = storage::resolve(&self.upload_root, &stored_path) {
                    storage::remove_best_effort(&path);
                }
                Err(e)
            }
        }
    }

    /// Builds an archive and, when `record` is set, advances the event's
    /// download state. Returns the new state when it was recorded.
    pub async fn download(
        &self,
        event_id: i64,
        album_id: Option<i64>,
        record: bool,
    ) -> PipelineResult<(Archive, Option<DownloadStatus>)> {
        let db = self.db.clone();
        let root = self.upload_root.clone();
        let archive = tokio::task::spawn_blocking(move || {
            archive::build_archive(&db, &root, event_id, album_id)
        })
        .await??;

        let status = if record {
            Some(download_status::record_archive_build(
                &self.db,
                event_id,
                archive.scope,
            )?)
        } else {
            None
        };
        Ok((archive, status))
    }

    pub fn delete_media(&self, media_id: i64) -> PipelineResult<bool> {
        media::delete_media(&self.db, &self.upload_root, media_id)
    }
}

fn clean_contributor_name(name: Option<&str>) -> Option<String> {
    let name = name?.trim();
    if name.is_empty() {
        return None;
    }
    Some(name.chars().take(MAX_CONTRIBUTOR_NAME_CHARS).collect())
}
