use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Application-specific error types.
#[derive(Debug)]
pub enum AppError {
    /// Database-related errors.
    DatabaseError(sqlx::Error),
    /// Resource not found error.
    NotFound(String),
    /// Bad request error (invalid input).
    BadRequest(String),
    /// Validation error on user-submitted fields (missing name, bad phone, etc.).
    Validation(String),
    /// Error interacting with an external API.
    ExternalApiError(String),
    /// Internal server error.
    InternalError(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::DatabaseError(e) => write!(f, "Database error: {}", e),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Validation(msg) => write!(f, "Validation error: {}", msg),
            AppError::ExternalApiError(msg) => write!(f, "External API error: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl AppError {
    /// Wire error code for the intake API's 200-status `ok:false` envelopes.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::BadRequest(_) | AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::ExternalApiError(_) => "EXTERNAL_SERVICE_ERROR",
            AppError::DatabaseError(_) | AppError::InternalError(_) => "INTERNAL_SERVER_ERROR",
            AppError::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Message safe to show the end user. Validation and not-found detail
    /// passes through; everything else collapses to a generic Hebrew notice.
    pub fn user_message(&self) -> String {
        match self {
            AppError::NotFound(msg) | AppError::BadRequest(msg) | AppError::Validation(msg) => {
                msg.clone()
            }
            AppError::DatabaseError(_)
            | AppError::ExternalApiError(_)
            | AppError::InternalError(_) => "אירעה שגיאה בעת עיבוד הבקשה".to_string(),
            AppError::WithContext { source, .. } => source.user_message(),
        }
    }
}

impl IntoResponse for AppError {
    /// Converts the error into the intake API's response envelope.
    ///
    /// Every endpoint answers HTTP 200; failures are carried in the body as
    /// `{ok: false, errorCode, errorMessage}` and the front end switches on
    /// the `ok` flag. Raw detail is logged server-side; the body only carries
    /// the user-safe message.
    fn into_response(self) -> Response {
        match &self {
            AppError::DatabaseError(e) => tracing::error!("Database error: {:?}", e),
            AppError::ExternalApiError(msg) => tracing::error!("External API error: {}", msg),
            AppError::InternalError(msg) => tracing::error!("Internal error: {}", msg),
            AppError::WithContext { source, context } => {
                tracing::error!("Error with context: {} -> {}", context, source)
            }
            AppError::NotFound(msg) | AppError::BadRequest(msg) | AppError::Validation(msg) => {
                tracing::warn!("request rejected: {}", msg)
            }
        }

        let body = Json(json!({
            "ok": false,
            "errorCode": self.error_code(),
            "errorMessage": self.user_message(),
        }));

        (StatusCode::OK, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::ExternalApiError(err.to_string())
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;

    /// Add context lazily (only evaluated on error).
    #[allow(dead_code)]
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: f(),
        })
    }
}

/// Extension for sqlx::Error to add context
impl<T> ResultExt<T> for Result<T, sqlx::Error> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(AppError::DatabaseError(e)),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(AppError::DatabaseError(e)),
            context: f(),
        })
    }
}
