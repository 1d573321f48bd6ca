use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::services::spreadsheet::SheetTable;

/// Column names and first rows of a stored upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadPreview {
    pub filename: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub total_rows: usize,
}

/// Stores uploaded spreadsheets and resolves them by name.
#[derive(Debug, Clone)]
pub struct UploadService {
    config: Arc<AppConfig>,
}

impl UploadService {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self { config }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.config.upload_dir
    }

    /// `true` when `filename` has a dot and an allowed extension (case-insensitive).
    pub fn is_allowed(&self, filename: &str) -> bool {
        filename
            .rsplit_once('.')
            .map_or(false, |(_, ext)| self.config.is_allowed_extension(ext))
    }

    /// Location of a stored upload. The name is sanitised first so lookups
    /// can never leave the upload directory.
    pub fn resolve(&self, filename: &str) -> Result<PathBuf, ServiceError> {
        let safe = secure_filename(filename)
            .ok_or_else(|| ServiceError::ValidationError(format!("invalid file name: {:?}", filename)))?;
        Ok(self.upload_dir().join(safe))
    }

    /// Like [`resolve`](Self::resolve) but fails with `NotFound` when nothing is stored under the name.
    pub fn existing(&self, filename: &str) -> Result<PathBuf, ServiceError> {
        let path = self.resolve(filename)?;
        if !path.is_file() {
            return Err(ServiceError::NotFound(format!("uploaded file {}", filename)));
        }
        Ok(path)
    }

    /// Validates, stores and previews an upload. A file that cannot be read
    /// as a spreadsheet is removed again before the error is returned.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn store(
        &self,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<UploadPreview, ServiceError> {
        if !self.is_allowed(original_name) {
            return Err(ServiceError::ValidationError(format!(
                "file type not allowed: {:?} (expected one of: {})",
                original_name,
                self.config.allowed_extensions.join(", ")
            )));
        }
        let filename = secure_filename(original_name)
            .filter(|name| self.is_allowed(name))
            .ok_or_else(|| {
                ServiceError::ValidationError(format!("invalid file name: {:?}", original_name))
            })?;

        tokio::fs::create_dir_all(self.upload_dir()).await?;
        let path = self.upload_dir().join(&filename);
        tokio::fs::write(&path, bytes).await?;
        info!(file = %filename, "upload stored");

        let preview_rows = self.config.preview_rows;
        let read_path = path.clone();
        let table = tokio::task::spawn_blocking(move || SheetTable::read(&read_path)).await?;

        match table {
            Ok(table) => Ok(UploadPreview {
                filename,
                columns: table.columns().to_vec(),
                rows: table.preview(preview_rows),
                total_rows: table.row_count(),
            }),
            Err(err) => {
                if let Err(remove_err) = tokio::fs::remove_file(&path).await {
                    warn!(file = %filename, error = %remove_err, "could not remove unreadable upload");
                }
                Err(err.into())
            }
        }
    }
}

/// Reduces a client-supplied name to a safe, flat file name: path separators
/// and whitespace become underscores, anything outside `[A-Za-z0-9_.-]` is
/// dropped and leading or trailing dots and underscores are stripped.
/// Returns `None` when nothing usable is left.
pub fn secure_filename(name: &str) -> Option<String> {
    let flattened: String = name
        .chars()
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = flattened.split_whitespace().collect::<Vec<_>>().join("_");
    let cleaned: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    let trimmed = cleaned.trim_matches(|c| c == '.' || c == '_');

    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;

    #[rstest]
    #[case("ventas.xlsx", Some("ventas.xlsx"))]
    #[case("mis ventas 2024.xls", Some("mis_ventas_2024.xls"))]
    #[case("../../etc/passwd", Some("etc_passwd"))]
    #[case("C:\\datos\\ventas.xlsx", Some("C_datos_ventas.xlsx"))]
    #[case("  .hidden.xlsx", Some("hidden.xlsx"))]
    #[case("año€.xlsx", Some("ao.xlsx"))]
    #[case("../..", None)]
    #[case("", None)]
    fn sanitises_file_names(#[case] raw: &str, #[case] expected: Option<&str>) {
        assert_eq!(secure_filename(raw).as_deref(), expected);
    }

    fn service(dir: &Path) -> UploadService {
        UploadService::new(Arc::new(AppConfig::with_base_dir(dir)))
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = service(dir.path());
        assert!(uploads.is_allowed("ventas.XLSX"));
        assert!(uploads.is_allowed("ventas.xls"));
        assert!(!uploads.is_allowed("ventas.csv"));
        assert!(!uploads.is_allowed("xlsx"));
    }

    #[tokio::test]
    async fn rejected_extension_stores_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = service(dir.path());
        let result = uploads.store("ventas.csv", b"fecha,total\n").await;

        assert_matches!(result, Err(ServiceError::ValidationError(_)));
        assert!(!uploads.upload_dir().exists() || std::fs::read_dir(uploads.upload_dir()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn unreadable_spreadsheet_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = service(dir.path());
        let result = uploads.store("ventas.xlsx", b"not a workbook").await;

        assert_matches!(result, Err(ServiceError::Spreadsheet(_)));
        assert!(!uploads.upload_dir().join("ventas.xlsx").exists());
    }

    #[test]
    fn lookups_stay_inside_the_upload_directory() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = service(dir.path());

        let path = uploads.resolve("../secret.xlsx").unwrap();
        assert_eq!(path, uploads.upload_dir().join("secret.xlsx"));
        assert_matches!(uploads.existing("missing.xlsx"), Err(ServiceError::NotFound(_)));
        assert_matches!(uploads.resolve("/"), Err(ServiceError::ValidationError(_)));
    }
}
