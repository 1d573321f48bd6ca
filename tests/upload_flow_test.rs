mod common;

use axum::http::StatusCode;
use common::{body_bytes, body_json, daily_sales, sales_workbook, text_date_workbook, TestApp};

#[tokio::test]
async fn upload_form_is_served() {
    let app = TestApp::new();
    let response = app.get("/").await;

    assert_eq!(response.status(), StatusCode::OK);
    let html = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(html.contains("enctype=\"multipart/form-data\""));
    assert!(html.contains("name=\"file\""));
}

#[tokio::test]
async fn upload_returns_lowercased_columns_and_ten_rows() {
    let app = TestApp::new();
    let response = app
        .upload("ventas_enero.xlsx", &sales_workbook(&daily_sales(30)))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["filename"], "ventas_enero.xlsx");
    assert_eq!(body["columns"], serde_json::json!(["fecha", "total", "tienda"]));
    assert_eq!(body["rows"].as_array().unwrap().len(), 10);
    assert_eq!(body["rows"][0][0], "2024-01-01");
    assert_eq!(body["total_rows"], 30);
    assert_eq!(app.upload_files(), vec!["ventas_enero.xlsx"]);
}

#[tokio::test]
async fn short_upload_previews_every_row() {
    let app = TestApp::new();
    let response = app
        .upload("pocas.xlsx", &text_date_workbook(&daily_sales(4)))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["rows"].as_array().unwrap().len(), 4);
    assert_eq!(body["rows"][3][0], "2024-01-04");
}

#[tokio::test]
async fn disallowed_extension_is_rejected_without_storing() {
    let app = TestApp::new();
    let response = app.upload("ventas.csv", b"fecha,total\n2024-01-01,10\n").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["kind"], "validation");
    assert!(body["message"].as_str().unwrap().contains("not allowed"));
    assert!(app.upload_files().is_empty());
    assert!(app.image_files().is_empty());
    assert!(app.report_files().is_empty());
}

#[tokio::test]
async fn unreadable_workbook_is_rejected_and_removed() {
    let app = TestApp::new();
    let response = app.upload("roto.xlsx", b"this is not a workbook").await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(response).await["kind"], "data");
    assert!(app.upload_files().is_empty());
}

#[tokio::test]
async fn missing_file_field_is_a_validation_error() {
    let app = TestApp::new();
    let response = app
        .upload_field("documento", "ventas.xlsx", &sales_workbook(&daily_sales(3)))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.upload_files().is_empty());
}

#[tokio::test]
async fn client_paths_are_flattened() {
    let app = TestApp::new();
    let response = app
        .upload("../../ventas.xlsx", &sales_workbook(&daily_sales(3)))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["filename"], "ventas.xlsx");
    assert_eq!(app.upload_files(), vec!["ventas.xlsx"]);
}

#[tokio::test]
async fn error_responses_carry_the_request_id() {
    let app = TestApp::new();
    let request = axum::http::Request::builder()
        .uri("/analizar/nunca_subido.xlsx")
        .header("x-request-id", "trace-me-42")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.request(request).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()["x-request-id"], "trace-me-42");
    assert_eq!(body_json(response).await["request_id"], "trace-me-42");
}

#[tokio::test]
async fn health_reports_directories() {
    let app = TestApp::new();
    let response = app.get("/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "up");
    assert_eq!(body["details"]["uploads"]["status"], "up");
    assert_eq!(body["details"]["reports"]["status"], "up");
}
