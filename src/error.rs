use std::time::Duration;

/// Failures surfaced by the upload and archive pipeline.
///
/// The first group are domain outcomes the caller turns into a user-facing
/// rejection; the wrapped variants are infrastructure faults.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("albums {album_ids:?} do not belong to event {event_id}")]
    InvalidAssociation { event_id: i64, album_ids: Vec<i64> },

    #[error("upload rejected: {0}")]
    PayloadRejected(String),

    #[error("transcoding failed: {0}")]
    TranscodeFailed(String),

    #[error("encoder did not finish within {}s", .0.as_secs())]
    TranscodeTimeout(Duration),

    #[error("video encoder unavailable: {0}")]
    EncoderUnavailable(String),

    #[error("no media available to archive")]
    NothingToArchive,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl PipelineError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    /// Whether the error describes a problem with the request rather than
    /// with the server.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::InvalidAssociation { .. }
                | Self::PayloadRejected(_)
                | Self::TranscodeFailed(_)
                | Self::NothingToArchive
                | Self::Conflict(_)
        )
    }
}

impl From<tokio::task::JoinError> for PipelineError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(anyhow::anyhow!("background task failed: {}", err))
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
