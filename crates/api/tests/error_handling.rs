//! Tests for `AppError` → HTTP response mapping.
//!
//! These call `IntoResponse` directly on `AppError` values; no server needed.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use http_body_util::BodyExt;
use mole_api::error::AppError;
use mole_core::error::CoreError;

/// Helper: convert an `AppError` into its status code and parsed JSON body.
async fn error_to_response(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

#[tokio::test]
async fn not_found_error_returns_404() {
    let err = AppError::Core(CoreError::job_not_found("abc"));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], "computation with id abc not found");
}

#[tokio::test]
async fn gone_error_returns_410() {
    let (status, json) = error_to_response(CoreError::Gone("abc".into()).into()).await;

    assert_eq!(status, StatusCode::GONE);
    assert_eq!(json["code"], "GONE");
}

#[tokio::test]
async fn validation_error_returns_400() {
    let err = CoreError::Validation("Unknown data format 'gif'.".into());

    let (status, json) = error_to_response(err.into()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert_eq!(json["error"], "Unknown data format 'gif'.");
}

#[tokio::test]
async fn admission_rejection_returns_409() {
    let err = CoreError::AdmissionRejected("Server is under heavy load".into());

    let (status, json) = error_to_response(err.into()).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "ADMISSION_REJECTED");
}

#[tokio::test]
async fn fetch_failure_returns_502() {
    let err = CoreError::FetchFailed("Entry 9zzz not found.".into());

    let (status, json) = error_to_response(err.into()).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["error"], "Entry 9zzz not found.");
}

#[tokio::test]
async fn internal_errors_are_sanitized() {
    let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "/secret/path");

    let (status, json) = error_to_response(CoreError::Io(io).into()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "INTERNAL_ERROR");
    assert_eq!(json["error"], "An internal error occurred");
}

#[tokio::test]
async fn bad_request_returns_400() {
    let (status, json) =
        error_to_response(AppError::BadRequest("Missing required 'file' field".into())).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");
}
