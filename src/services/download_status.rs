use crate::error::{PipelineError, PipelineResult};
use crate::models::{ArchiveScope, DownloadStatus};
use crate::Database;
use rusqlite::{OptionalExtension, TransactionBehavior};

/// Records a successful archive build against the event's download state.
///
/// A whole-event build always lands on `FullyDownloaded`; an album build only
/// raises the state to `PartiallyDownloaded`. The state is read and written
/// inside one immediate transaction so concurrent builds can never move it
/// backwards. `last_downloaded_at` is refreshed on every call.
pub fn record_archive_build(
    db: &Database,
    event_id: i64,
    scope: ArchiveScope,
) -> PipelineResult<DownloadStatus> {
    let mut conn = db.get()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let current: String = tx
        .query_row(
            "SELECT download_status FROM events WHERE id = ?",
            [event_id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| PipelineError::not_found("event", event_id))?;
    let current: DownloadStatus = current.parse().unwrap_or_default();
    let next = current.after_build(scope);

    let now = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
    tx.execute(
        "UPDATE events SET download_status = ?, last_downloaded_at = ? WHERE id = ?",
        rusqlite::params![next.as_str(), now, event_id],
    )?;
    tx.commit()?;

    if next != current {
        tracing::info!(
            event_id,
            from = %current,
            to = %next,
            "Event download status advanced"
        );
    }
    Ok(next)
}
