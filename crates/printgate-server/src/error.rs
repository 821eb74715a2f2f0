// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTTP mapping for domain errors.

use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use printgate_core::error::PrintgateError;
use serde_json::json;
use tracing::{error, warn};

/// Everything a handler can fail with.
#[derive(Debug)]
pub enum ApiError {
    Domain(PrintgateError),
    Multipart(MultipartError),
    BadRequest(String),
    CsrfMismatch,
}

impl From<PrintgateError> for ApiError {
    fn from(err: PrintgateError) -> Self {
        Self::Domain(err)
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self::Multipart(err)
    }
}

pub fn status_for(err: &PrintgateError) -> StatusCode {
    match err {
        PrintgateError::UnsupportedFormat(_) | PrintgateError::InvalidOptions(_) => {
            StatusCode::BAD_REQUEST
        }
        PrintgateError::JobNotFound(_) => StatusCode::NOT_FOUND,
        PrintgateError::InvalidState { .. } => StatusCode::CONFLICT,
        PrintgateError::UploadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        PrintgateError::QueueFull { .. } => StatusCode::TOO_MANY_REQUESTS,
        PrintgateError::NoPrinterSelected => StatusCode::SERVICE_UNAVAILABLE,
        PrintgateError::ConversionFailed(_)
        | PrintgateError::PrintSubmissionFailed(_)
        | PrintgateError::Storage(_)
        | PrintgateError::Database(_)
        | PrintgateError::Config(_)
        | PrintgateError::Io(_)
        | PrintgateError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// `{"error": message}` with the given status.
pub fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Domain(err) => {
                let status = status_for(&err);
                if status.is_server_error() {
                    error!(error = %err, "request failed");
                } else {
                    warn!(error = %err, %status, "request rejected");
                }
                json_error(status, err.to_string())
            }
            Self::Multipart(err) => {
                warn!(error = %err, "malformed upload");
                json_error(err.status(), err.body_text())
            }
            Self::BadRequest(message) => json_error(StatusCode::BAD_REQUEST, message),
            Self::CsrfMismatch => {
                warn!("CSRF token mismatch");
                json_error(StatusCode::FORBIDDEN, "CSRF token missing or invalid")
            }
        }
    }
}
