use crate::error::PipelineError;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

/// Handler error: a pipeline failure, or a request the handler could not
/// even turn into a pipeline call.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("bad request: {0}")]
    BadRequest(String),
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        Self::BadRequest(err.body_text())
    }
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            AppError::Pipeline(e) => match e {
                PipelineError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                PipelineError::NothingToArchive => (StatusCode::NOT_FOUND, "NOTHING_TO_ARCHIVE"),
                PipelineError::InvalidAssociation { .. } => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_ASSOCIATION")
                }
                PipelineError::PayloadRejected(_) => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "PAYLOAD_REJECTED")
                }
                PipelineError::TranscodeFailed(_) => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "TRANSCODE_FAILED")
                }
                PipelineError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
                PipelineError::TranscodeTimeout(_) => {
                    (StatusCode::GATEWAY_TIMEOUT, "TRANSCODE_TIMEOUT")
                }
                PipelineError::EncoderUnavailable(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "ENCODER_UNAVAILABLE")
                }
                PipelineError::Io(_)
                | PipelineError::Database(_)
                | PipelineError::Pool(_)
                | PipelineError::Archive(_)
                | PipelineError::Internal(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
                }
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = if status.is_server_error() {
            tracing::error!("Application error: {:?}", self);
            match &self {
                AppError::Pipeline(PipelineError::EncoderUnavailable(_))
                | AppError::Pipeline(PipelineError::TranscodeTimeout(_)) => self.to_string(),
                _ => "Internal server error".to_string(),
            }
        } else {
            self.to_string()
        };

        let body = serde_json::json!({
            "error": message,
            "code": code,
        });
        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
