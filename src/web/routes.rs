use super::handlers;
use super::state::AppState;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post, put};
use axum::Router;
use std::sync::Arc;

/// Room for multipart framing and the text fields on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn upload_routes(max_upload_bytes: usize) -> Router<Arc<AppState>> {
    Router::new()
        .route("/events/:event_id/media", post(handlers::media::upload))
        .layer(DefaultBodyLimit::max(
            max_upload_bytes.saturating_add(MULTIPART_OVERHEAD),
        ))
}

pub fn archive_routes() -> Router<Arc<AppState>> {
    Router::new().route("/events/:event_id/archive", get(handlers::archive::download))
}

pub fn media_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/media/:id", delete(handlers::media::delete))
        .route("/media/:id/albums", put(handlers::media::set_albums))
        .route(
            "/media/:id/albums/:album_id",
            post(handlers::media::add_to_album).delete(handlers::media::remove_from_album),
        )
}
