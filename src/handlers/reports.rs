use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use tracing::info;

use crate::errors::ServiceError;
use crate::handlers::AppState;

/// GET /descargar_pdf/:filename - download a generated report as an attachment
pub async fn download_pdf(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ServiceError> {
    let path = state.reports.report_path(&filename)?;
    let bytes = tokio::fs::read(&path).await?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(crate::services::reports::FULL_REPORT_FILENAME);
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", name))
        .map_err(|e| ServiceError::InternalError(e.to_string()))?;

    info!(report = %name, size = bytes.len(), "report downloaded");
    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/pdf")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from(bytes),
    )
        .into_response())
}
