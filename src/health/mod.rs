/*!
 * # Health Check Module
 *
 * `GET /health` reports liveness, the crate version, uptime and whether each
 * working directory (uploads, images, reports) exists. A missing directory
 * degrades the status; the service still answers because the pipeline
 * recreates directories on demand.
 */

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Instant;

use crate::AppState;

/// Basic health status
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Up,
    Degraded,
}

/// Health check detail
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HealthDetail {
    pub status: HealthStatus,
    pub message: Option<String>,
}

/// Overall health information
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HealthInfo {
    pub status: HealthStatus,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub details: BTreeMap<String, HealthDetail>,
}

static START_TIME: OnceLock<Instant> = OnceLock::new();

/// Records the process start for uptime reporting; later calls are no-ops.
pub fn init_start_time() {
    let _ = START_TIME.get_or_init(Instant::now);
}

fn uptime_seconds() -> u64 {
    START_TIME.get().map(|t| t.elapsed().as_secs()).unwrap_or(0)
}

fn directory_detail(path: &Path) -> HealthDetail {
    if path.is_dir() {
        HealthDetail {
            status: HealthStatus::Up,
            message: None,
        }
    } else {
        HealthDetail {
            status: HealthStatus::Degraded,
            message: Some(format!("{} does not exist", path.display())),
        }
    }
}

pub fn health_info(state: &AppState) -> HealthInfo {
    let config = &state.config;
    let details: BTreeMap<String, HealthDetail> = [
        ("uploads", config.upload_dir.as_path()),
        ("images", config.images_dir.as_path()),
        ("reports", config.reports_dir.as_path()),
    ]
    .into_iter()
    .map(|(name, path)| (name.to_string(), directory_detail(path)))
    .collect();

    let status = if details.values().all(|d| d.status == HealthStatus::Up) {
        HealthStatus::Up
    } else {
        HealthStatus::Degraded
    };

    HealthInfo {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        uptime_seconds: uptime_seconds(),
        details,
    }
}

/// Liveness report; always 200 while the process serves requests.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(health_info(&state)))
}
