use crate::error::PipelineError;
use crate::services::archive;
use crate::web::error::AppResult;
use crate::web::state::AppState;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderName, HeaderValue};
use axum::response::{IntoResponse, Response};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Deserializer};
use std::sync::Arc;
use tokio_util::io::ReaderStream;

const ENTRIES_HEADER: HeaderName = HeaderName::from_static("x-archive-entries");
const SKIPPED_HEADER: HeaderName = HeaderName::from_static("x-archive-skipped");

/// RFC 5987 `attr-char`: everything outside it is percent-encoded.
const ATTR_CHAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

#[derive(Debug, Deserialize)]
pub struct ArchiveParams {
    /// An empty `album_id=` means the whole event.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub album_id: Option<i64>,
    /// Record the build against the event's download state.
    #[serde(default = "default_record")]
    pub record: bool,
}

fn default_record() -> bool {
    true
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// GET /events/:event_id/archive
pub async fn download(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<i64>,
    Query(params): Query<ArchiveParams>,
) -> AppResult<Response> {
    let (archive, status) = state
        .pipeline
        .download(event_id, params.album_id, params.record)
        .await?;

    if let Some(status) = status {
        tracing::debug!(event_id, status = %status, "Archive download recorded");
    }

    // The reopened handle keeps the zip readable after the temp path is gone.
    let file = tokio::fs::File::from_std(archive.file.reopen().map_err(PipelineError::from)?);
    let body = Body::from_stream(ReaderStream::new(file));

    let headers = [
        (header::CONTENT_TYPE, HeaderValue::from_static(archive::CONTENT_TYPE)),
        (header::CONTENT_DISPOSITION, content_disposition(&archive.file_name)),
        (header::CONTENT_LENGTH, HeaderValue::from(archive.size)),
        (ENTRIES_HEADER, HeaderValue::from(archive.summary.included())),
        (SKIPPED_HEADER, HeaderValue::from(archive.summary.skipped())),
    ];
    Ok((headers, body).into_response())
}

/// `attachment` disposition with an ASCII fallback name and the UTF-8 name
/// in `filename*`.
fn content_disposition(file_name: &str) -> HeaderValue {
    let fallback: String = file_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect();

    let mut value = format!("attachment; filename=\"{}\"", fallback);
    if !file_name.is_ascii() {
        value.push_str("; filename*=UTF-8''");
        value.extend(utf8_percent_encode(file_name, ATTR_CHAR));
    }
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_disposition_ascii() {
        let value = content_disposition("Wedding 2024.zip");
        assert_eq!(value.to_str().unwrap(), "attachment; filename=\"Wedding 2024.zip\"");
    }

    #[test]
    fn test_content_disposition_utf8() {
        let value = content_disposition("Zoë.zip");
        assert_eq!(
            value.to_str().unwrap(),
            "attachment; filename=\"Zo_.zip\"; filename*=UTF-8''Zo%C3%AB.zip"
        );
    }

    #[test]
    fn test_content_disposition_encodes_outside_attr_char() {
        let value = content_disposition("Café & Bar (2024).zip");
        assert_eq!(
            value.to_str().unwrap(),
            "attachment; filename=\"Caf_ & Bar (2024).zip\"; \
             filename*=UTF-8''Caf%C3%A9%20&%20Bar%20%282024%29.zip"
        );
    }

    fn parse_params(query: &str) -> Option<ArchiveParams> {
        let uri: axum::http::Uri = format!("/events/1/archive?{}", query).parse().unwrap();
        Query::<ArchiveParams>::try_from_uri(&uri).ok().map(|q| q.0)
    }

    #[test]
    fn test_empty_album_id_means_whole_event() {
        let params = parse_params("album_id=&record=true").unwrap();
        assert_eq!(params.album_id, None);
        assert!(params.record);

        let params = parse_params("record=false").unwrap();
        assert_eq!(params.album_id, None);
        assert!(!params.record);

        assert_eq!(parse_params("album_id=7").unwrap().album_id, Some(7));
        assert!(parse_params("album_id=seven").is_none());
    }
}
