//! Gate run on every upload before any storage or transcoding cost is paid.

use crate::error::{PipelineError, PipelineResult};
use crate::models::{Event, MediaKind};
use crate::services::{albums, events};
use crate::Database;

#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    pub max_video_duration_secs: f64,
    pub max_upload_bytes: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_video_duration_secs: 30.0,
            max_upload_bytes: 100 * 1024 * 1024,
        }
    }
}

/// The parts of an upload request the validator inspects.
#[derive(Debug, Clone, Copy)]
pub struct UploadCheck<'a> {
    pub event_id: i64,
    pub album_ids: &'a [i64],
    pub kind: MediaKind,
    pub duration_secs: Option<f64>,
    pub data: &'a [u8],
}

/// Validates an upload and returns the target event.
///
/// Checks run in a fixed order: event exists and accepts uploads, every album
/// belongs to the event, video duration is within limits, then the payload
/// itself. The first failing check wins.
pub fn validate_upload(
    db: &Database,
    limits: &UploadLimits,
    check: &UploadCheck<'_>,
) -> PipelineResult<Event> {
    let conn = db.get()?;

    let event = events::find_event(&conn, check.event_id)?
        .ok_or_else(|| PipelineError::not_found("event", check.event_id))?;
    if !event.is_active {
        return Err(PipelineError::PayloadRejected(format!(
            "event {} is not accepting uploads",
            event.id
        )));
    }

    let foreign = albums::foreign_album_ids(&conn, event.id, check.album_ids)?;
    if !foreign.is_empty() {
        return Err(PipelineError::InvalidAssociation {
            event_id: event.id,
            album_ids: foreign,
        });
    }

    if check.kind == MediaKind::Video {
        check_video_duration(check.duration_secs, limits.max_video_duration_secs)?;
    }

    check_payload(check.kind, check.data, limits.max_upload_bytes)?;

    Ok(event)
}

pub fn check_video_duration(duration_secs: Option<f64>, max_secs: f64) -> PipelineResult<()> {
    let duration = duration_secs.ok_or_else(|| {
        PipelineError::PayloadRejected("video duration is required".to_string())
    })?;
    if !duration.is_finite() || duration <= 0.0 {
        return Err(PipelineError::PayloadRejected(format!(
            "invalid video duration {}",
            duration
        )));
    }
    if duration > max_secs {
        return Err(PipelineError::PayloadRejected(format!(
            "video is {:.1}s long, the limit is {}s",
            duration, max_secs
        )));
    }
    Ok(())
}

fn check_payload(kind: MediaKind, data: &[u8], max_bytes: usize) -> PipelineResult<()> {
    if data.is_empty() {
        return Err(PipelineError::PayloadRejected("file is empty".to_string()));
    }
    if data.len() > max_bytes {
        return Err(PipelineError::PayloadRejected(format!(
            "file too large: {} bytes (max {} bytes)",
            data.len(),
            max_bytes
        )));
    }

    // Undetected content is left for the transcoder to accept or refuse.
    if let Some(sniffed) = infer::get(data) {
        let expected = match kind {
            MediaKind::Image => infer::MatcherType::Image,
            MediaKind::Video => infer::MatcherType::Video,
        };
        if sniffed.matcher_type() != expected {
            return Err(PipelineError::PayloadRejected(format!(
                "file content is {}, expected {}",
                sniffed.mime_type(),
                kind
            )));
        }
    }
    Ok(())
}
