// Spreadsheet ingestion and upload storage
pub mod spreadsheet;
pub mod uploads;

// Analysis pipeline and report generation
pub mod analysis;
pub mod reports;

pub use analysis::{AnalysisReport, AnalysisService, ImagePaths};
pub use reports::ReportService;
pub use uploads::{UploadPreview, UploadService};
