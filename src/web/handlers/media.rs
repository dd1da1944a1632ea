use crate::models::MediaKind;
use crate::services::media;
use crate::services::upload::UploadRequest;
use crate::web::error::{AppError, AppResult};
use crate::web::state::AppState;
use crate::PipelineError;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub id: i64,
    pub kind: MediaKind,
    pub stored_path: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct SetAlbumsRequest {
    #[serde(default)]
    pub album_ids: Vec<i64>,
}

/// POST /events/:event_id/media
pub async fn upload(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<i64>,
    mut multipart: Multipart,
) -> AppResult<Response> {
    let mut kind: Option<MediaKind> = None;
    let mut file: Option<(Option<String>, Vec<u8>)> = None;
    let mut album_ids = Vec::new();
    let mut is_public = false;
    let mut contributor_name = None;
    let mut duration_secs = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().map(str::to_string);
                let data = field.bytes().await?;
                file = Some((file_name, data.to_vec()));
            }
            "kind" => {
                let value = field.text().await?;
                kind = Some(
                    value
                        .parse()
                        .map_err(|_| AppError::BadRequest(format!("unknown media kind '{}'", value)))?,
                );
            }
            "album_id" | "album_ids" => {
                let value = field.text().await?;
                for part in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                    let id = part
                        .parse::<i64>()
                        .map_err(|_| AppError::BadRequest(format!("invalid album id '{}'", part)))?;
                    album_ids.push(id);
                }
            }
            "is_public" => {
                let value = field.text().await?;
                is_public = parse_flag(&value);
            }
            "contributor_name" => {
                contributor_name = Some(field.text().await?);
            }
            "duration_secs" => {
                let value = field.text().await?;
                let value = value.trim();
                if !value.is_empty() {
                    duration_secs = Some(value.parse::<f64>().map_err(|_| {
                        AppError::BadRequest(format!("invalid duration '{}'", value))
                    })?);
                }
            }
            _ => {
                tracing::debug!("Ignoring unknown upload field '{}'", name);
            }
        }
    }

    let kind = kind.ok_or_else(|| AppError::BadRequest("missing 'kind' field".to_string()))?;
    let (file_name, data) =
        file.ok_or_else(|| AppError::BadRequest("missing 'file' field".to_string()))?;

    let item = state
        .pipeline
        .upload(UploadRequest {
            event_id,
            album_ids,
            kind,
            file_name,
            data,
            is_public,
            contributor_name,
            duration_secs,
        })
        .await?;

    let body = UploadResponse {
        id: item.id,
        kind: item.kind,
        url: item.url(),
        stored_path: item.stored_path,
    };
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

/// PUT /media/:id/albums
pub async fn set_albums(
    State(state): State<Arc<AppState>>,
    Path(media_id): Path<i64>,
    Json(request): Json<SetAlbumsRequest>,
) -> AppResult<StatusCode> {
    media::set_albums(state.db(), media_id, &request.album_ids)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /media/:id/albums/:album_id
pub async fn add_to_album(
    State(state): State<Arc<AppState>>,
    Path((media_id, album_id)): Path<(i64, i64)>,
) -> AppResult<StatusCode> {
    media::add_to_album(state.db(), media_id, album_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /media/:id/albums/:album_id
pub async fn remove_from_album(
    State(state): State<Arc<AppState>>,
    Path((media_id, album_id)): Path<(i64, i64)>,
) -> AppResult<StatusCode> {
    media::remove_from_album(state.db(), media_id, album_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /media/:id
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(media_id): Path<i64>,
) -> AppResult<StatusCode> {
    if state.pipeline.delete_media(media_id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(PipelineError::not_found("media", media_id).into())
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "on" | "yes"
    )
}
