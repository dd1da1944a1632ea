use crate::error::{PipelineError, PipelineResult};
use crate::models::{MediaItem, MediaKind, NewMedia};
use crate::services::{albums, events, storage};
use crate::Database;
use rusqlite::{Connection, OptionalExtension, Row};
use std::collections::BTreeSet;
use std::path::Path;

const MEDIA_COLUMNS: &str =
    "m.id, m.event_id, m.kind, m.stored_path, m.is_public, m.contributor_name, m.duration_secs, m.created_at";

fn media_from_row(row: &Row<'_>) -> rusqlite::Result<MediaItem> {
    let kind: String = row.get(2)?;
    Ok(MediaItem {
        id: row.get(0)?,
        event_id: row.get(1)?,
        kind: kind.parse().map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                format!("unknown media kind '{}'", kind).into(),
            )
        })?,
        stored_path: row.get(3)?,
        is_public: row.get(4)?,
        contributor_name: row.get(5)?,
        duration_secs: row.get(6)?,
        created_at: row.get(7)?,
    })
}

/// Inserts a media row and files it into its albums in one transaction.
pub fn create_media(db: &Database, new: &NewMedia) -> PipelineResult<MediaItem> {
    let mut conn = db.get()?;
    let tx = conn.transaction()?;

    if events::find_event(&tx, new.event_id)?.is_none() {
        return Err(PipelineError::not_found("event", new.event_id));
    }
    let foreign = albums::foreign_album_ids(&tx, new.event_id, &new.album_ids)?;
    if !foreign.is_empty() {
        return Err(PipelineError::InvalidAssociation {
            event_id: new.event_id,
            album_ids: foreign,
        });
    }

    let duration = match new.kind {
        MediaKind::Video => new.duration_secs,
        MediaKind::Image => None,
    };
    tx.execute(
        "INSERT INTO media (event_id, kind, stored_path, is_public, contributor_name, duration_secs)
         VALUES (?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            new.event_id,
            new.kind.to_string(),
            new.stored_path,
            new.is_public,
            new.contributor_name,
            duration,
        ],
    )?;
    let id = tx.last_insert_rowid();
    insert_links(&tx, id, &new.album_ids)?;

    let media = find_media(&tx, id)?.ok_or_else(|| PipelineError::not_found("media", id))?;
    tx.commit()?;
    Ok(media)
}

pub fn get_media(db: &Database, id: i64) -> PipelineResult<Option<MediaItem>> {
    let conn = db.get()?;
    find_media(&conn, id)
}

fn find_media(conn: &Connection, id: i64) -> PipelineResult<Option<MediaItem>> {
    let media = conn
        .query_row(
            &format!("SELECT {} FROM media m WHERE m.id = ?", MEDIA_COLUMNS),
            [id],
            media_from_row,
        )
        .optional()?;
    Ok(media)
}

pub fn list_media_for_event(db: &Database, event_id: i64) -> PipelineResult<Vec<MediaItem>> {
    let conn = db.get()?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM media m WHERE m.event_id = ? ORDER BY m.created_at, m.id",
        MEDIA_COLUMNS
    ))?;
    let media = stmt
        .query_map([event_id], media_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(media)
}

pub fn list_media_for_album(db: &Database, album_id: i64) -> PipelineResult<Vec<MediaItem>> {
    let conn = db.get()?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM media m
         JOIN media_albums ma ON ma.media_id = m.id
         WHERE ma.album_id = ?
         ORDER BY m.created_at, m.id",
        MEDIA_COLUMNS
    ))?;
    let media = stmt
        .query_map([album_id], media_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(media)
}

pub fn album_ids_for_media(db: &Database, media_id: i64) -> PipelineResult<Vec<i64>> {
    let conn = db.get()?;
    let mut stmt =
        conn.prepare("SELECT album_id FROM media_albums WHERE media_id = ? ORDER BY album_id")?;
    let ids = stmt
        .query_map([media_id], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

/// Replaces the album membership of a media item. An empty slice clears it.
///
/// Nothing changes if any album belongs to another event.
pub fn set_albums(db: &Database, media_id: i64, album_ids: &[i64]) -> PipelineResult<()> {
    let mut conn = db.get()?;
    let tx = conn.transaction()?;

    let event_id = media_event_id(&tx, media_id)?;
    let foreign = albums::foreign_album_ids(&tx, event_id, album_ids)?;
    if !foreign.is_empty() {
        return Err(PipelineError::InvalidAssociation {
            event_id,
            album_ids: foreign,
        });
    }

    tx.execute("DELETE FROM media_albums WHERE media_id = ?", [media_id])?;
    insert_links(&tx, media_id, album_ids)?;
    tx.commit()?;
    Ok(())
}

/// Files a media item into an album. Adding an existing link is a no-op.
pub fn add_to_album(db: &Database, media_id: i64, album_id: i64) -> PipelineResult<()> {
    let conn = db.get()?;
    let event_id = media_event_id(&conn, media_id)?;
    let foreign = albums::foreign_album_ids(&conn, event_id, &[album_id])?;
    if !foreign.is_empty() {
        return Err(PipelineError::InvalidAssociation {
            event_id,
            album_ids: foreign,
        });
    }
    insert_links(&conn, media_id, &[album_id])?;
    Ok(())
}

/// Takes a media item out of an album. Removing a missing link is a no-op.
pub fn remove_from_album(db: &Database, media_id: i64, album_id: i64) -> PipelineResult<()> {
    let conn = db.get()?;
    media_event_id(&conn, media_id)?;
    conn.execute(
        "DELETE FROM media_albums WHERE media_id = ? AND album_id = ?",
        [media_id, album_id],
    )?;
    Ok(())
}

/// Deletes a media item, its album links and its file. Returns `false` when
/// no such item exists.
///
/// The file is removed best-effort after the record is committed: a failure
/// is logged and leaves an unreferenced file rather than a dangling row.
pub fn delete_media(db: &Database, upload_root: &Path, id: i64) -> PipelineResult<bool> {
    let mut conn = db.get()?;
    let tx = conn.transaction()?;

    let stored_path: Option<String> = tx
        .query_row("SELECT stored_path FROM media WHERE id = ?", [id], |row| {
            row.get(0)
        })
        .optional()?;
    let Some(stored_path) = stored_path else {
        return Ok(false);
    };

    tx.execute("DELETE FROM media_albums WHERE media_id = ?", [id])?;
    tx.execute("DELETE FROM media WHERE id = ?", [id])?;
    tx.commit()?;

    // After commit: a failed delete must keep its file.
    match storage::resolve(upload_root, &stored_path) {
        Ok(file_path) => storage::remove_best_effort(&file_path),
        Err(e) => tracing::warn!("Not deleting file for media {}: {}", id, e),
    }

    tracing::info!("Deleted media {} ({})", id, stored_path);
    Ok(true)
}

fn media_event_id(conn: &Connection, media_id: i64) -> PipelineResult<i64> {
    conn.query_row(
        "SELECT event_id FROM media WHERE id = ?",
        [media_id],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| PipelineError::not_found("media", media_id))
}

fn insert_links(conn: &Connection, media_id: i64, album_ids: &[i64]) -> PipelineResult<()> {
    let unique: BTreeSet<i64> = album_ids.iter().copied().collect();
    let mut stmt =
        conn.prepare("INSERT OR IGNORE INTO media_albums (media_id, album_id) VALUES (?, ?)")?;
    for album_id in unique {
        stmt.execute([media_id, album_id])?;
    }
    Ok(())
}
