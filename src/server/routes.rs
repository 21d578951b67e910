use super::AppState;
use crate::url::{file_name, parse_series_url};
use crate::CbzError;
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Deserialize)]
pub(crate) struct SeriesQuery {
    series_url: Option<String>,
}

/// Streams the archive of the requested series
///
/// Headers are held back until the first archive bytes exist, so a request that
/// fails early (no chapters, upstream errors) still gets a proper error status.
/// Once streaming has started a failure can only cut the body short.
pub(crate) async fn series_archive(
    State(state): State<AppState>,
    Query(query): Query<SeriesQuery>,
) -> Response {
    let Some(raw) = query.series_url.filter(|raw| !raw.trim().is_empty()) else {
        return CbzError::Parse("missing series_url parameter".to_string()).into_response();
    };

    let series = match parse_series_url(raw.trim()) {
        Ok(series) => series,
        Err(e) => return e.into_response(),
    };

    let mut stream = match state.pipeline.stream(series.clone()).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!("Could not start {}: {}", series, e);
            return e.into_response();
        }
    };

    let first = match stream.next().await {
        Some(Ok(first)) => first,
        Some(Err(e)) => {
            warn!("Request for {} failed: {}", series, e);
            return e.into_response();
        }
        None => {
            let e = std::io::Error::other("archive ended before any data");
            return CbzError::Io(e).into_response();
        }
    };

    let head = futures::stream::once(async move { Ok::<_, CbzError>(first) });
    let body = Body::from_stream(head.chain(stream));

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/zip"),
    );

    let name = file_name(&series).unwrap_or("series");
    if let Some(value) = content_disposition(&format!("{}.zip", name)) {
        response
            .headers_mut()
            .insert(header::CONTENT_DISPOSITION, value);
    }

    response
}

pub(crate) async fn health() -> &'static str {
    "ok"
}

/// Builds an attachment header with an ASCII-only file name
fn content_disposition(filename: &str) -> Option<HeaderValue> {
    let ascii: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    HeaderValue::from_str(&format!("attachment; filename=\"{}\"", ascii)).ok()
}
