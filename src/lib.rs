//! Sales forecast API library
//!
//! Uploads sales spreadsheets, decomposes and forecasts the daily totals
//! and renders charts plus a PDF report for every analysis run.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod charts;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod health;
pub mod middleware_helpers;
pub mod ml;
pub mod models;
pub mod services;
pub mod tracing;

use axum::{extract::DefaultBodyLimit, routing::get, Router};
use std::sync::Arc;
use tower_http::services::ServeDir;

use crate::config::AppConfig;
use crate::services::{AnalysisService, ReportService, UploadService};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub uploads: Arc<UploadService>,
    pub analysis: Arc<AnalysisService>,
    pub reports: Arc<ReportService>,
}

impl AppState {
    /// Wires every service from one configuration.
    pub fn new(config: AppConfig) -> Self {
        let config = Arc::new(config);
        let reports = Arc::new(ReportService::new(&config));
        let analysis = Arc::new(AnalysisService::new(config.clone(), reports.clone()));
        let uploads = Arc::new(UploadService::new(config.clone()));
        Self {
            config,
            uploads,
            analysis,
            reports,
        }
    }
}

/// Application routes with body limit, static chart serving, HTTP tracing and request ids.
pub fn app_router(state: AppState) -> Router {
    let images = ServeDir::new(&state.config.images_dir);
    let body_limit = state.config.max_body_size;

    Router::new()
        .route(
            "/",
            get(handlers::uploads::upload_form).post(handlers::uploads::upload_file),
        )
        .route("/analizar/:filename", get(handlers::analysis::analyze))
        .route(
            "/descargar_pdf/:filename",
            get(handlers::reports::download_pdf),
        )
        .route("/health", get(health::health_check))
        .nest_service("/static", images)
        .layer(DefaultBodyLimit::max(body_limit))
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}
