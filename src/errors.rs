//! Structured error taxonomy shared by the HTTP surface and the pipeline.
//!
//! Every user-facing failure is one of the variants below. Each carries a
//! fixed HTTP status and a machine-readable `error_code`; [`AppError::into_response`]
//! renders the standard envelope `{error, error_code, message, details, timestamp}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug)]
pub enum AppError {
    NotFound {
        resource: String,
        id: String,
    },
    Unauthorized(String),
    Forbidden(String),
    Validation {
        message: String,
        fields: Vec<FieldError>,
    },
    ExternalService {
        service: String,
        retryable: bool,
        detail: String,
    },
    RateLimit {
        retry_after_secs: u64,
    },
    Processing {
        stage: String,
        detail: String,
    },
    /// The targeted resource existed when the request started but was
    /// removed before the operation finished (e.g. a document deleted
    /// mid-extraction).
    Gone {
        resource: String,
        id: String,
    },
    Internal(anyhow::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ExternalService { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::RateLimit { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Processing { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Gone { .. } => StatusCode::GONE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::NotFound { .. } => "NOT_FOUND",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::Validation { .. } => "VALIDATION_ERROR",
            AppError::ExternalService { .. } => "EXTERNAL_SERVICE_ERROR",
            AppError::RateLimit { .. } => "RATE_LIMIT_EXCEEDED",
            AppError::Processing { .. } => "PROCESSING_ERROR",
            AppError::Gone { .. } => "RESOURCE_GONE",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn user_message(&self) -> String {
        match self {
            AppError::NotFound { resource, id } => format!("{} '{}' was not found", resource, id),
            AppError::Unauthorized(msg) => msg.clone(),
            AppError::Forbidden(msg) => msg.clone(),
            AppError::Validation { message, .. } => message.clone(),
            AppError::ExternalService { service, .. } => {
                format!("{} is temporarily unavailable", service)
            }
            AppError::RateLimit { retry_after_secs } => {
                format!("Rate limit exceeded, retry after {}s", retry_after_secs)
            }
            AppError::Processing { .. } => "Document processing failed".to_string(),
            AppError::Gone { resource, id } => {
                format!("{} '{}' no longer exists", resource, id)
            }
            AppError::Internal(_) => "An internal error occurred".to_string(),
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            AppError::Validation { fields, .. } if !fields.is_empty() => {
                Some(serde_json::json!({ "fields": fields }))
            }
            AppError::ExternalService {
                service, retryable, ..
            } => Some(serde_json::json!({ "service": service, "retryable": retryable })),
            AppError::RateLimit { retry_after_secs } => {
                Some(serde_json::json!({ "retry_after": retry_after_secs }))
            }
            AppError::Processing { stage, .. } => Some(serde_json::json!({ "stage": stage })),
            _ => None,
        }
    }

    pub fn not_found(resource: impl Into<String>, id: impl Into<String>) -> Self {
        AppError::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            fields: Vec::new(),
        }
    }

    /// Validation error naming a single offending field.
    pub fn field_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        let field = field.into();
        let message = message.into();
        AppError::Validation {
            message: format!("{}: {}", field, message),
            fields: vec![FieldError {
                field,
                message,
            }],
        }
    }

    pub fn processing(stage: impl Into<String>, detail: impl Into<String>) -> Self {
        AppError::Processing {
            stage: stage.into(),
            detail: detail.into(),
        }
    }

    pub fn external_service(service: impl Into<String>, retryable: bool, detail: impl Into<String>) -> Self {
        AppError::ExternalService {
            service: service.into(),
            retryable,
            detail: detail.into(),
        }
    }

    pub fn gone(resource: impl Into<String>, id: impl Into<String>) -> Self {
        AppError::Gone {
            resource: resource.into(),
            id: id.into(),
        }
    }

    pub fn rate_limit(retry_after_secs: u64) -> Self {
        AppError::RateLimit { retry_after_secs }
    }

    /// Build the appropriate classified error for a failed external call
    /// (LLM or embedding provider): a rate-limit error when the provider
    /// gave a `Retry-After` hint, an external-service error otherwise.
    pub fn from_external_failure(
        service: impl Into<String>,
        retryable: bool,
        retry_after_secs: Option<u64>,
        detail: impl Into<String>,
    ) -> Self {
        match retry_after_secs {
            Some(secs) => AppError::RateLimit {
                retry_after_secs: secs,
            },
            None => AppError::external_service(service, retryable, detail),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::NotFound { resource, id } => write!(f, "{} not found: {}", resource, id),
            AppError::Unauthorized(m) => write!(f, "unauthorized: {}", m),
            AppError::Forbidden(m) => write!(f, "forbidden: {}", m),
            AppError::Validation { message, .. } => write!(f, "validation error: {}", message),
            AppError::ExternalService { service, detail, .. } => {
                write!(f, "external service error ({}): {}", service, detail)
            }
            AppError::RateLimit { retry_after_secs } => {
                write!(f, "rate limited, retry after {}s", retry_after_secs)
            }
            AppError::Processing { stage, detail } => {
                write!(f, "processing error at stage '{}': {}", stage, detail)
            }
            AppError::Gone { resource, id } => write!(f, "{} gone: {}", resource, id),
            AppError::Internal(e) => write!(f, "internal error: {}", e),
        }
    }
}

impl std::error::Error for AppError {}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        match e.downcast::<AppError>() {
            Ok(app_err) => app_err,
            Err(e) => AppError::Internal(e),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Internal(e.into())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Internal(e.into())
    }
}

#[derive(Serialize)]
struct ErrorEnvelope {
    error: bool,
    error_code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
    timestamp: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        crate::logging::error(
            "request_error",
            &format!("{} status={}", self, status.as_u16()),
        );
        let body = ErrorEnvelope {
            error: true,
            error_code: self.error_code().to_string(),
            message: self.user_message(),
            details: self.details(),
            timestamp: Utc::now().to_rfc3339(),
        };
        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
