#![allow(dead_code)]

use std::path::Path;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use chrono::{Duration, NaiveDate};
use rust_xlsxwriter::{Format, Workbook};
use sales_forecast_api::{app_router, config::AppConfig, AppState};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

pub const BOUNDARY: &str = "sales-forecast-test-boundary";

/// Router wired to a throwaway working directory.
pub struct TestApp {
    router: Router,
    pub config: AppConfig,
    _dir: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Small charts and a seeded order search, adjusted by `customize`.
    pub fn with_config(customize: impl FnOnce(&mut AppConfig)) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let mut config = AppConfig::with_base_dir(dir.path());
        config.charts.width = 480;
        config.charts.height = 320;
        config.analysis.search_seed = Some(7);
        customize(&mut config);
        config
            .ensure_directories()
            .expect("failed to create working directories");

        let router = app_router(AppState::new(config.clone()));
        Self {
            router,
            config,
            _dir: dir,
        }
    }

    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn get(&self, uri: &str) -> Response {
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .expect("failed to build request");
        self.request(request).await
    }

    /// POST / with `bytes` as the multipart `file` field.
    pub async fn upload(&self, filename: &str, bytes: &[u8]) -> Response {
        self.upload_field("file", filename, bytes).await
    }

    pub async fn upload_field(&self, field: &str, filename: &str, bytes: &[u8]) -> Response {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(field, filename, bytes)))
            .expect("failed to build request");
        self.request(request).await
    }

    pub fn upload_files(&self) -> Vec<String> {
        files_in(&self.config.upload_dir)
    }

    pub fn image_files(&self) -> Vec<String> {
        files_in(&self.config.images_dir)
    }

    pub fn report_files(&self) -> Vec<String> {
        files_in(&self.config.reports_dir)
    }
}

/// Sorted file names in `dir`; empty when it does not exist.
pub fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read body")
        .to_vec()
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).expect("body is not JSON")
}

pub fn multipart_body(field: &str, filename: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
        b = BOUNDARY,
        field = field,
        filename = filename,
    )
    .into_bytes();
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

/// `days` consecutive days of upward-trending sales with a weekly pattern.
pub fn daily_sales(days: usize) -> Vec<(NaiveDate, f64)> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date");
    let weekly = [18.0, -6.0, 4.0, -2.0, -11.0, 9.0, -12.0];
    (0..days)
        .map(|i| {
            let date = start + Duration::days(i as i64);
            let total = 1_000.0 + 12.5 * i as f64 + weekly[i % 7] + ((i * 37) % 11) as f64;
            (date, total)
        })
        .collect()
}

fn excel_serial(date: NaiveDate) -> f64 {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30).expect("valid date");
    (date - epoch).num_days() as f64
}

/// Workbook with a `Fecha` date column, a `Total` column and an ignored `Tienda` column.
pub fn sales_workbook(rows: &[(NaiveDate, f64)]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let date_format = Format::new().set_num_format("yyyy-mm-dd");
    let sheet = workbook.add_worksheet();

    sheet.write_string(0, 0, "Fecha").expect("header");
    sheet.write_string(0, 1, "Total").expect("header");
    sheet.write_string(0, 2, "Tienda").expect("header");
    for (i, (date, total)) in rows.iter().enumerate() {
        let row = i as u32 + 1;
        sheet
            .write_number_with_format(row, 0, excel_serial(*date), &date_format)
            .expect("date cell");
        sheet.write_number(row, 1, *total).expect("total cell");
        sheet.write_string(row, 2, "centro").expect("store cell");
    }

    workbook.save_to_buffer().expect("failed to build workbook")
}

/// Workbook whose dates are plain `YYYY-MM-DD` text cells.
pub fn text_date_workbook(rows: &[(NaiveDate, f64)]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();

    sheet.write_string(0, 0, "fecha").expect("header");
    sheet.write_string(0, 1, "total").expect("header");
    for (i, (date, total)) in rows.iter().enumerate() {
        let row = i as u32 + 1;
        sheet
            .write_string(row, 0, date.format("%Y-%m-%d").to_string())
            .expect("date cell");
        sheet.write_number(row, 1, *total).expect("total cell");
    }

    workbook.save_to_buffer().expect("failed to build workbook")
}

/// Workbook missing the `total` column.
pub fn workbook_without_total() -> Vec<u8> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "fecha").expect("header");
    sheet.write_string(0, 1, "monto").expect("header");
    sheet.write_string(1, 0, "2024-01-01").expect("cell");
    sheet.write_number(1, 1, 10.0).expect("cell");
    workbook.save_to_buffer().expect("failed to build workbook")
}
