use axum::{
    extract::{Multipart, State},
    response::{Html, Response},
};
use tracing::info;

use super::common::success_response;
use crate::errors::ServiceError;
use crate::handlers::AppState;

/// Multipart field carrying the spreadsheet.
pub const UPLOAD_FIELD: &str = "file";

const UPLOAD_FORM: &str = r#"<!doctype html>
<html lang="es">
<head>
  <meta charset="utf-8">
  <title>Analisis de ventas</title>
</head>
<body>
  <h1>Subir archivo de ventas</h1>
  <p>Formatos aceptados: .xls, .xlsx. Columnas requeridas: fecha, total.</p>
  <form method="post" action="/" enctype="multipart/form-data">
    <input type="file" name="file" accept=".xls,.xlsx" required>
    <button type="submit">Subir</button>
  </form>
</body>
</html>
"#;

/// GET / - upload form
pub async fn upload_form() -> Html<&'static str> {
    Html(UPLOAD_FORM)
}

/// POST / - store a spreadsheet and return a preview of its first rows
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, ServiceError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let original_name = field
            .file_name()
            .map(str::to_string)
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| ServiceError::ValidationError("no file selected".to_string()))?;
        let bytes = field.bytes().await?;

        let preview = state.uploads.store(&original_name, &bytes).await?;
        info!(file = %preview.filename, rows = preview.total_rows, "upload accepted");
        return Ok(success_response(preview));
    }

    Err(ServiceError::ValidationError(format!(
        "multipart field '{}' is missing",
        UPLOAD_FIELD
    )))
}
