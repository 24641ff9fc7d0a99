// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::cache::CacheError;
use crate::pipeline::PipelineError;
use crate::security::SecurityError;

/// HTTP API error with a status, a stable code and a client-facing message
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest { code: &'static str, message: String },

    // 401 Unauthorized
    Unauthorized { code: &'static str, message: String },

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound { code: &'static str, message: String },

    // 500 Internal Server Error
    InternalServerError { code: &'static str, message: String },
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest { .. } => 400,
            ApiError::Unauthorized { .. } => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound { .. } => 404,
            ApiError::InternalServerError { .. } => 500,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest { message, .. }
            | ApiError::Unauthorized { message, .. }
            | ApiError::NotFound { message, .. }
            | ApiError::InternalServerError { message, .. } => message,
            ApiError::Forbidden(message) => message,
        }
    }

    /// Error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest { code, .. }
            | ApiError::Unauthorized { code, .. }
            | ApiError::NotFound { code, .. }
            | ApiError::InternalServerError { code, .. } => *code,
            ApiError::Forbidden(_) => "FORBIDDEN",
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "error": true,
            "message": self.message(),
            "code": self.error_code()
        })
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            code: "BAD_REQUEST",
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound {
            code: "NOT_FOUND",
            message: message.into(),
        }
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError {
            code: "INTERNAL_SERVER_ERROR",
            message: message.into(),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let code = err.code();
        match err {
            PipelineError::MissingParameter(_) | PipelineError::InvalidArgument(_) => ApiError::BadRequest {
                code,
                message: err.to_string(),
            },
            PipelineError::Security(_) => ApiError::Unauthorized {
                code,
                message: err.to_string(),
            },
            PipelineError::LayerNotFound(_) | PipelineError::RebuildNotFound(_) | PipelineError::UnknownPipeline(_) => {
                ApiError::NotFound {
                    code,
                    message: err.to_string(),
                }
            }
            PipelineError::Datastore(_) | PipelineError::Configuration(_) => {
                // Log the real error, the client gets the code only
                tracing::error!("Pipeline failure: {}", err);
                ApiError::InternalServerError {
                    code,
                    message: "An error occurred while processing your request".to_string(),
                }
            }
        }
    }
}

impl From<SecurityError> for ApiError {
    fn from(err: SecurityError) -> Self {
        PipelineError::Security(err).into()
    }
}

impl From<CacheError> for ApiError {
    fn from(err: CacheError) -> Self {
        tracing::error!("Cache failure: {}", err);
        ApiError::InternalServerError {
            code: "CACHE_ERROR",
            message: "Tile cache unavailable".to_string(),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_error_mapping() {
        let err: ApiError = PipelineError::MissingParameter("layerId".into()).into();
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.error_code(), "MISSING_PARAMETER");

        let err: ApiError = PipelineError::RebuildNotFound("abc".into()).into();
        assert_eq!(err.status_code(), 404);
        assert_eq!(err.error_code(), "REBUILD_NOT_FOUND");
    }

    #[test]
    fn test_security_error_is_unauthorized() {
        let err: ApiError = SecurityError::InvalidToken("expired".into()).into();
        assert_eq!(err.status_code(), 401);
        assert_eq!(err.to_json()["code"], "SECURITY_ERROR");
    }
}
