use crate::error::{PipelineError, PipelineResult};
use crate::models::{ArchiveScope, MediaItem, MediaKind};
use crate::services::{albums, events, media, storage};
use crate::Database;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub const CONTENT_TYPE: &str = "application/zip";

/// Characters that cannot appear in a file name on at least one common
/// filesystem.
const INVALID_FILE_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

#[derive(Debug, Clone, PartialEq)]
pub enum EntryOutcome {
    Included { media_id: i64, entry_name: String },
    Skipped { media_id: i64, reason: String },
}

#[derive(Debug, Clone, Default)]
pub struct ArchiveSummary {
    pub outcomes: Vec<EntryOutcome>,
}

impl ArchiveSummary {
    pub fn included(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, EntryOutcome::Included { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.len() - self.included()
    }

    pub fn entry_names(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                EntryOutcome::Included { entry_name, .. } => Some(entry_name.as_str()),
                EntryOutcome::Skipped { .. } => None,
            })
            .collect()
    }
}

/// A finished archive. The zip lives in a temporary file that is removed
/// when the archive is dropped, unless it is persisted first.
#[derive(Debug)]
pub struct Archive {
    pub file_name: String,
    pub file: NamedTempFile,
    pub size: u64,
    pub scope: ArchiveScope,
    pub summary: ArchiveSummary,
}

impl Archive {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Moves the zip to `target`, copying when a rename is not possible
    /// (e.g. across filesystems).
    pub fn persist(self, target: &Path) -> io::Result<()> {
        match self.file.persist(target) {
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::debug!("Rename into {} failed, copying: {}", target.display(), e.error);
                std::fs::copy(e.file.path(), target)?;
                Ok(())
            }
        }
    }
}

/// Builds a zip of an event's media, or of one album's media when
/// `album_id` is given.
///
/// Files missing from disk are skipped and reported in the summary. When
/// nothing is left to pack the build stops with `NothingToArchive` before any
/// archive is opened.
pub fn build_archive(
    db: &Database,
    upload_root: &Path,
    event_id: i64,
    album_id: Option<i64>,
) -> PipelineResult<Archive> {
    let (event, album) = {
        let conn = db.get()?;
        let event = events::find_event(&conn, event_id)?
            .ok_or_else(|| PipelineError::not_found("event", event_id))?;
        let album = match album_id {
            Some(id) => {
                let album = albums::find_album(&conn, id)?
                    .filter(|a| a.event_id == event_id)
                    .ok_or_else(|| PipelineError::not_found("album", id))?;
                Some(album)
            }
            None => None,
        };
        (event, album)
    };

    let (scope, candidates) = match &album {
        Some(album) => (
            ArchiveScope::Album(album.id),
            media::list_media_for_album(db, album.id)?,
        ),
        None => (ArchiveScope::Event, media::list_media_for_event(db, event.id)?),
    };

    let mut summary = ArchiveSummary::default();
    let mut present: Vec<(MediaItem, PathBuf)> = Vec::with_capacity(candidates.len());
    for item in candidates {
        match storage::resolve(upload_root, &item.stored_path) {
            Ok(path) if path.is_file() => present.push((item, path)),
            Ok(_) => skip(&mut summary, item.id, "file missing on disk".to_string()),
            Err(e) => skip(&mut summary, item.id, e.to_string()),
        }
    }

    if present.is_empty() {
        return Err(PipelineError::NothingToArchive);
    }

    let mut temp = tempfile::Builder::new()
        .prefix("guestbox-archive-")
        .suffix(".zip")
        .tempfile()?;
    let mut zip = ZipWriter::new(temp.as_file_mut());
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let mut sequence = 0;
    for (item, path) in present {
        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) => {
                skip(&mut summary, item.id, format!("could not open file: {}", e));
                continue;
            }
        };

        let name = entry_name(
            item.kind,
            sequence + 1,
            item.contributor_name.as_deref(),
            &item.stored_path,
        );
        zip.start_file(name.as_str(), options)?;
        if let Err(e) = std::io::copy(&mut file, &mut zip) {
            zip.abort_file()?;
            skip(&mut summary, item.id, format!("could not read file: {}", e));
            continue;
        }

        sequence += 1;
        summary.outcomes.push(EntryOutcome::Included {
            media_id: item.id,
            entry_name: name,
        });
    }

    if sequence == 0 {
        return Err(PipelineError::NothingToArchive);
    }

    zip.finish()?.flush()?;
    let size = temp.as_file().metadata()?.len();

    let file_name = archive_file_name(event.id, &event.name, album.as_ref().map(|a| a.name.as_str()));

    tracing::info!(
        event_id = event.id,
        album_id = album.as_ref().map(|a| a.id),
        included = summary.included(),
        skipped = summary.skipped(),
        bytes = size,
        "Built archive {}",
        file_name
    );

    Ok(Archive {
        file_name,
        file: temp,
        size,
        scope,
        summary,
    })
}

fn skip(summary: &mut ArchiveSummary, media_id: i64, reason: String) {
    tracing::warn!("Skipping media {} in archive: {}", media_id, reason);
    summary.outcomes.push(EntryOutcome::Skipped { media_id, reason });
}

/// `Photo_0001_Anna.webp`, or `Video_0002.mp4` without a contributor.
pub fn entry_name(
    kind: MediaKind,
    sequence: usize,
    contributor: Option<&str>,
    stored_path: &str,
) -> String {
    let extension = Path::new(stored_path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", sanitize_file_name(e)))
        .unwrap_or_default();
    let contributor = contributor
        .map(sanitize_file_name)
        .filter(|c| !c.is_empty())
        .map(|c| format!("_{}", c))
        .unwrap_or_default();
    format!(
        "{}_{:04}{}{}",
        kind.archive_label(),
        sequence,
        contributor,
        extension
    )
}

/// Suggested download name: `{event}.zip` or `{event}_{album}.zip`.
pub fn archive_file_name(event_id: i64, event_name: &str, album_name: Option<&str>) -> String {
    let mut base = sanitize_file_name(event_name);
    if base.is_empty() {
        base = format!("event_{}", event_id);
    }
    if let Some(album) = album_name.map(sanitize_file_name).filter(|a| !a.is_empty()) {
        base.push('_');
        base.push_str(&album);
    }
    format!("{}.zip", base)
}

/// Strips characters that are invalid in file names, plus control
/// characters, and trims surrounding whitespace and dots.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !c.is_control() && !INVALID_FILE_NAME_CHARS.contains(c))
        .collect();
    cleaned.trim_matches(|c: char| c.is_whitespace() || c == '.').to_string()
}
