//! Domain records shared by the analysis pipeline, the report builder and the HTTP layer.

mod analysis;
mod sales;

pub use analysis::{format_thousands, ArimaOrder, ChartArtifact, ChartKind, ReportSummary};
pub use sales::{SalesDataset, SalesRecord};
