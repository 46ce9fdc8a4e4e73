use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::admission::{AccessError, AdmissionServiceError, RepositoryError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Admission(AdmissionServiceError),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Admission(err) => admission_status(err),
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn admission_status(err: &AdmissionServiceError) -> StatusCode {
    match err {
        AdmissionServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AdmissionServiceError::InvalidTransition(_) | AdmissionServiceError::Conflict { .. } => {
            StatusCode::CONFLICT
        }
        AdmissionServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        AdmissionServiceError::AccessDenied(AccessError::Unauthenticated) => {
            StatusCode::UNAUTHORIZED
        }
        AdmissionServiceError::AccessDenied(_) => StatusCode::FORBIDDEN,
        AdmissionServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        AdmissionServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        AdmissionServiceError::Repository(_) | AdmissionServiceError::Directory(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Admission(err) => write!(f, "{}", err),
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
            AppError::Admission(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
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

impl From<AdmissionServiceError> for AppError {
    fn from(value: AdmissionServiceError) -> Self {
        Self::Admission(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::admission::{
        AdmissionStatus, Section, StepStatus, TransitionError, ValidationError,
    };

    fn status_of(err: AdmissionServiceError) -> StatusCode {
        AppError::from(err).status_code()
    }

    #[test]
    fn admission_errors_map_to_http_statuses() {
        assert_eq!(
            status_of(ValidationError::NoCandidates.into()),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(AdmissionServiceError::InvalidTransition(
                TransitionError::InvalidTransition {
                    action: "approve",
                    status: AdmissionStatus::Completed,
                    step_status: StepStatus::Approved,
                }
            )),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(AdmissionServiceError::Conflict {
                expected: 1,
                found: 2
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(AdmissionServiceError::NotFound("admission x".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(AccessError::Unauthenticated.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(AccessError::SectionDenied(Section::Admissions).into()),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(RepositoryError::Unavailable("offline".to_string()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn config_errors_are_internal() {
        let err = AppError::from(ConfigError::InvalidPort);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().starts_with("configuration error"));
    }
}
