use crate::error::{PipelineError, PipelineResult};
use crate::models::Album;
use crate::Database;
use rusqlite::{Connection, OptionalExtension, Row};
use std::collections::BTreeSet;

fn album_from_row(row: &Row<'_>) -> rusqlite::Result<Album> {
    Ok(Album {
        id: row.get(0)?,
        event_id: row.get(1)?,
        name: row.get(2)?,
        created_at: row.get(3)?,
    })
}

pub fn create_album(db: &Database, event_id: i64, name: &str) -> PipelineResult<Album> {
    let conn = db.get()?;
    let inserted = conn.execute(
        "INSERT INTO albums (event_id, name) SELECT id, ? FROM events WHERE id = ?",
        rusqlite::params![name, event_id],
    )?;
    if inserted == 0 {
        return Err(PipelineError::not_found("event", event_id));
    }
    let id = conn.last_insert_rowid();
    find_album(&conn, id)?.ok_or_else(|| PipelineError::not_found("album", id))
}

pub fn get_album(db: &Database, id: i64) -> PipelineResult<Option<Album>> {
    let conn = db.get()?;
    find_album(&conn, id)
}

pub(crate) fn find_album(conn: &Connection, id: i64) -> PipelineResult<Option<Album>> {
    let album = conn
        .query_row(
            "SELECT id, event_id, name, created_at FROM albums WHERE id = ?",
            [id],
            album_from_row,
        )
        .optional()?;
    Ok(album)
}

pub fn list_albums(db: &Database, event_id: i64) -> PipelineResult<Vec<Album>> {
    let conn = db.get()?;
    let mut stmt = conn.prepare(
        "SELECT id, event_id, name, created_at FROM albums WHERE event_id = ? ORDER BY name, id",
    )?;
    let albums = stmt
        .query_map([event_id], album_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(albums)
}

pub fn rename_album(db: &Database, id: i64, name: &str) -> PipelineResult<()> {
    let conn = db.get()?;
    let updated = conn.execute(
        "UPDATE albums SET name = ? WHERE id = ?",
        rusqlite::params![name, id],
    )?;
    if updated == 0 {
        return Err(PipelineError::not_found("album", id));
    }
    Ok(())
}

/// Deletes an album. Refused while any media item is still filed in it.
pub fn delete_album(db: &Database, id: i64) -> PipelineResult<()> {
    let conn = db.get()?;
    let members: i64 = conn.query_row(
        "SELECT COUNT(*) FROM media_albums WHERE album_id = ?",
        [id],
        |row| row.get(0),
    )?;
    if members > 0 {
        return Err(PipelineError::Conflict(format!(
            "album {} still contains {} media item(s)",
            id, members
        )));
    }
    let deleted = conn.execute("DELETE FROM albums WHERE id = ?", [id])?;
    if deleted == 0 {
        return Err(PipelineError::not_found("album", id));
    }
    Ok(())
}

/// Returns the ids from `album_ids` that are not albums of `event_id`,
/// including ids that do not exist at all. Result is sorted and deduplicated.
pub(crate) fn foreign_album_ids(
    conn: &Connection,
    event_id: i64,
    album_ids: &[i64],
) -> PipelineResult<Vec<i64>> {
    let requested: BTreeSet<i64> = album_ids.iter().copied().collect();
    if requested.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = requested.iter().map(|_| "?").collect::<Vec<_>>().join(",");
    let sql = format!(
        "SELECT id FROM albums WHERE event_id = ? AND id IN ({})",
        placeholders
    );
    let mut params: Vec<&dyn rusqlite::ToSql> = vec![&event_id];
    params.extend(requested.iter().map(|id| id as &dyn rusqlite::ToSql));

    let mut stmt = conn.prepare(&sql)?;
    let owned: BTreeSet<i64> = stmt
        .query_map(params.as_slice(), |row| row.get(0))?
        .collect::<Result<_, _>>()?;

    Ok(requested.difference(&owned).copied().collect())
}
