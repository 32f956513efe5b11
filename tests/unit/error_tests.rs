//! Display format and HTTP mapping of `AppError`.

use axum::http::StatusCode;
use sms_session_supervisor::AppError;

#[test]
fn lifecycle_errors_have_distinct_prefixes() {
    assert_eq!(
        AppError::AlreadyRunning("s1".into()).to_string(),
        "already running: s1"
    );
    assert_eq!(
        AppError::AlreadyStopped("s1".into()).to_string(),
        "already stopped: s1"
    );
    assert_eq!(AppError::NotRunning("s1".into()).to_string(), "not running: s1");
    assert_eq!(AppError::NotFound("s1".into()).to_string(), "not found: s1");
}

#[test]
fn launch_and_internal_errors_display() {
    assert_eq!(
        AppError::LaunchFailed("no screen".into()).to_string(),
        "launch failed: no screen"
    );
    assert_eq!(
        AppError::Internal("db down".into()).to_string(),
        "internal: db down"
    );
}

#[test]
fn io_error_converts() {
    let err: AppError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
    assert!(matches!(err, AppError::Io(msg) if msg.contains("gone")));
}

#[test]
fn status_codes_match_error_kind() {
    assert_eq!(
        AppError::NotFound(String::new()).status_code(),
        StatusCode::NOT_FOUND
    );
    for err in [
        AppError::AlreadyRunning(String::new()),
        AppError::AlreadyStopped(String::new()),
        AppError::NotRunning(String::new()),
    ] {
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }
    assert_eq!(
        AppError::Validation(String::new()).status_code(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        AppError::Unauthorized(String::new()).status_code(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        AppError::LaunchFailed(String::new()).status_code(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
    assert_eq!(
        AppError::Internal(String::new()).status_code(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}
