use crate::error::{PipelineError, PipelineResult};
use crate::models::{DownloadStatus, Event};
use crate::Database;
use rusqlite::{Connection, OptionalExtension, Row};

const EVENT_COLUMNS: &str =
    "id, name, is_active, download_status, last_downloaded_at, created_at";

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<Event> {
    Ok(Event {
        id: row.get(0)?,
        name: row.get(1)?,
        is_active: row.get(2)?,
        download_status: row
            .get::<_, String>(3)?
            .parse()
            .unwrap_or(DownloadStatus::NotDownloaded),
        last_downloaded_at: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub fn create_event(db: &Database, name: &str) -> PipelineResult<Event> {
    let conn = db.get()?;
    conn.execute("INSERT INTO events (name) VALUES (?)", [name])?;
    let id = conn.last_insert_rowid();
    find_event(&conn, id)?.ok_or_else(|| PipelineError::not_found("event", id))
}

pub fn get_event(db: &Database, id: i64) -> PipelineResult<Option<Event>> {
    let conn = db.get()?;
    find_event(&conn, id)
}

pub(crate) fn find_event(conn: &Connection, id: i64) -> PipelineResult<Option<Event>> {
    let event = conn
        .query_row(
            &format!("SELECT {} FROM events WHERE id = ?", EVENT_COLUMNS),
            [id],
            event_from_row,
        )
        .optional()?;
    Ok(event)
}

pub fn set_event_active(db: &Database, id: i64, active: bool) -> PipelineResult<()> {
    let conn = db.get()?;
    let updated = conn.execute(
        "UPDATE events SET is_active = ? WHERE id = ?",
        rusqlite::params![active, id],
    )?;
    if updated == 0 {
        return Err(PipelineError::not_found("event", id));
    }
    Ok(())
}
