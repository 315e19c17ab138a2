use crate::console::ConsoleError;
use crate::instances::RegistryError;
use crate::logs::LogError;
use crate::operations::{BackupError, OperationError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// JSON error reply: `{ "error": ..., "details": ... }`
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error: String,
    pub details: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a str>,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl ToString) -> Self {
        self.details = Some(details.to_string());
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::warn!(
            "Request failed ({}): {} {}",
            self.status,
            self.error,
            self.details.as_deref().unwrap_or("")
        );
        let body = ErrorBody {
            error: &self.error,
            details: self.details.as_deref(),
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::NotFound(_) => {
                ApiError::new(StatusCode::NOT_FOUND, "Instance not found").with_details(e)
            }
            _ => ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load instances")
                .with_details(e),
        }
    }
}

impl From<ConsoleError> for ApiError {
    fn from(e: ConsoleError) -> Self {
        match e {
            ConsoleError::Instance(e) => e.into(),
            ConsoleError::Rcon(e) => {
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "RCON command failed").with_details(e)
            }
            ConsoleError::EmptyMessage => ApiError::new(StatusCode::BAD_REQUEST, e.to_string()),
        }
    }
}

impl From<OperationError> for ApiError {
    fn from(e: OperationError) -> Self {
        match e {
            OperationError::UnknownOperation(_) => {
                ApiError::new(StatusCode::BAD_REQUEST, "Invalid operation").with_details(e)
            }
            _ => ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Operation failed").with_details(e),
        }
    }
}

impl From<BackupError> for ApiError {
    fn from(e: BackupError) -> Self {
        let status = match e {
            BackupError::InvalidFilename | BackupError::NotZip => StatusCode::BAD_REQUEST,
            BackupError::NotFound(_) => StatusCode::NOT_FOUND,
            BackupError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError::new(status, e.to_string())
    }
}

impl From<LogError> for ApiError {
    fn from(e: LogError) -> Self {
        match e {
            LogError::Instance(e) => e.into(),
            LogError::UnknownKind(_) => {
                ApiError::new(StatusCode::BAD_REQUEST, "Invalid log type").with_details(e)
            }
            LogError::NotConfigured { .. } => {
                ApiError::new(StatusCode::NOT_FOUND, "Log not configured").with_details(e)
            }
            LogError::Io { .. } => {
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to read log").with_details(e)
            }
        }
    }
}
