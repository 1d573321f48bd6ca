use axum::{
    extract::{Path, State},
    response::Response,
};

use super::common::{run_blocking, success_response};
use crate::errors::ServiceError;
use crate::handlers::AppState;

/// GET /analizar/:filename - run the analysis pipeline on an uploaded file
pub async fn analyze(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ServiceError> {
    let path = state.uploads.existing(&filename)?;
    let analysis = state.analysis.clone();

    let report = run_blocking(move || analysis.analyze_file(&path)).await?;
    Ok(success_response(report))
}
