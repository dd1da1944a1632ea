use crate::error::{PipelineError, PipelineResult};
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;

/// Builds a fresh stored path `{dir}/{uuid}.{extension}`.
///
/// The random token keeps concurrent uploads from colliding without any
/// locking on the uploads directory.
pub fn new_stored_path(dir: &str, extension: &str) -> String {
    format!("{}/{}.{}", dir, Uuid::new_v4(), extension)
}

/// Maps a forward-slash stored path onto the host filesystem below `root`.
pub fn resolve(root: &Path, stored_path: &str) -> PipelineResult<PathBuf> {
    let mut resolved = root.to_path_buf();
    for segment in stored_path.split('/').filter(|s| !s.is_empty()) {
        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(part)), None) => resolved.push(part),
            _ => {
                return Err(PipelineError::PayloadRejected(format!(
                    "invalid stored path '{}'",
                    stored_path
                )))
            }
        }
    }
    if resolved == root {
        return Err(PipelineError::PayloadRejected(
            "empty stored path".to_string(),
        ));
    }
    Ok(resolved)
}

/// Creates the parent directory of `path` if needed.
pub fn ensure_parent(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Removes a file, logging instead of failing. Missing files are not an error.
pub fn remove_best_effort(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove {}: {}", path.display(), e),
    }
}
