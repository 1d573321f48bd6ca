use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::charts::ChartError;
use crate::ml::ModelError;
use crate::services::spreadsheet::SpreadsheetError;

/// JSON body of every failed request.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Canonical reason of the status, e.g. "Unprocessable Entity"
    pub error: String,
    pub kind: ErrorKind,
    pub message: String,
    /// Id of the failed request, matching the `x-request-id` response header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Failure tiers surfaced at the HTTP boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Rejected request: bad extension, unsafe name, unknown file
    Validation,
    /// The uploaded data could not be analysed
    Data,
    /// Filesystem, rendering or runtime failure
    Internal,
}

impl ErrorKind {
    fn status(self) -> StatusCode {
        match self {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Data => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] SpreadsheetError),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Chart error: {0}")]
    Chart(#[from] ChartError),

    #[error("Report error: {0}")]
    ReportError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) | Self::ValidationError(_) => ErrorKind::Validation,
            Self::Spreadsheet(_) | Self::DataError(_) | Self::Model(_) => ErrorKind::Data,
            Self::Chart(_) | Self::ReportError(_) | Self::Io(_) | Self::InternalError(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// `NotFound` is the only variant whose status differs from its tier's.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            other => other.kind().status(),
        }
    }

    /// Message sent to the client; internal failures stay in the logs.
    pub fn public_message(&self) -> String {
        if self.kind() == ErrorKind::Internal {
            "Internal server error".to_string()
        } else {
            self.to_string()
        }
    }

    fn to_body(&self) -> ErrorBody {
        ErrorBody {
            error: self
                .status_code()
                .canonical_reason()
                .unwrap_or("Error")
                .to_string(),
            kind: self.kind(),
            message: self.public_message(),
            request_id: crate::tracing::current_request_id().map(|rid| rid.to_string()),
            timestamp: Utc::now(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        match self.kind() {
            ErrorKind::Internal => tracing::error!(error = %self, "request failed"),
            _ => tracing::warn!(error = %self, "request rejected"),
        }
        (self.status_code(), Json(self.to_body())).into_response()
    }
}

impl From<tokio::task::JoinError> for ServiceError {
    fn from(err: tokio::task::JoinError) -> Self {
        ServiceError::InternalError(format!("analysis task failed: {}", err))
    }
}

impl From<axum::extract::multipart::MultipartError> for ServiceError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        ServiceError::ValidationError(format!("invalid multipart body: {}", err))
    }
}
