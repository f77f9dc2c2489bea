use crate::access::guard::AccessError;
use crate::api::{access_error_response, error_response};
use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::approvals::router::approval_error_response;
use crate::workflows::approvals::ApprovalError;
use crate::workflows::notifications::router::inbox_error_response;
use crate::workflows::notifications::InboxError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::fmt;

/// Top-level error surfaced by the binary and by handlers that mix domains.
#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Approval(ApprovalError),
    Access(AccessError),
    Inbox(InboxError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Approval(err) => write!(f, "approval error: {}", err),
            AppError::Access(err) => write!(f, "access error: {}", err),
            AppError::Inbox(err) => write!(f, "notification error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Approval(err) => Some(err),
            AppError::Access(err) => Some(err),
            AppError::Inbox(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Approval(err) => approval_error_response(err),
            AppError::Access(err) => access_error_response(err),
            AppError::Inbox(err) => inbox_error_response(err),
            other => error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
                other.to_string(),
            ),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<ApprovalError> for AppError {
    fn from(value: ApprovalError) -> Self {
        Self::Approval(value)
    }
}

impl From<AccessError> for AppError {
    fn from(value: AccessError) -> Self {
        Self::Access(value)
    }
}

impl From<InboxError> for AppError {
    fn from(value: InboxError) -> Self {
        Self::Inbox(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::approvals::ValidationError;

    #[test]
    fn approval_errors_keep_their_http_status() {
        let response =
            AppError::from(ApprovalError::Validation(ValidationError::MissingRejectionReason))
                .into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn io_errors_are_internal() {
        let error = AppError::from(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        assert!(error.to_string().starts_with("io error"));
        assert_eq!(
            error.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
