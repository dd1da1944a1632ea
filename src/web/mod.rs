mod error;
mod handlers;
mod routes;
mod state;

pub use error::{AppError, AppResult};
pub use handlers::media::UploadResponse;
pub use state::AppState;

use crate::{Config, Database};
use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// The full application router. Stored uploads are served under `/uploads`.
pub fn router(state: Arc<AppState>) -> Router {
    let upload_root = state.pipeline.upload_root().to_path_buf();
    let max_upload_bytes = state.pipeline.limits().max_upload_bytes;

    Router::new()
        .merge(routes::upload_routes(max_upload_bytes))
        .merge(routes::archive_routes())
        .merge(routes::media_routes())
        .nest_service("/uploads", ServeDir::new(upload_root))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(config: Config, db: Database, addr: &str) -> Result<()> {
    let upload_root = config.media.upload_root();
    tokio::fs::create_dir_all(&upload_root).await?;

    let state = Arc::new(AppState::new(config, db)?);
    let app = router(state);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
