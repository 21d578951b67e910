//! Mapping of request failures onto HTTP responses

use crate::{CbzError, ErrorKind};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Returns the status a failure is reported with before streaming starts
pub(crate) fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Parse => StatusCode::BAD_REQUEST,
        ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Transport | ErrorKind::Size => StatusCode::BAD_GATEWAY,
        ErrorKind::Filesystem => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::Cancellation => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for CbzError {
    fn into_response(self) -> Response {
        let status = status_for(self.kind());
        (status, self.to_string()).into_response()
    }
}
