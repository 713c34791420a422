//! Error taxonomy shared by the validator, the repository and the HTTP layer
//!
//! Every failure a caller can observe is one of the [`AppError`] variants and is
//! rendered as a JSON body of the form:
//!
//! ```json
//! { "error": "...", "code": "VALIDATION_FAILED", "fields": [...] }
//! ```

use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

/// A single rejected field in a payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Field name as it appears in the JSON payload (e.g. `"make"`, `"repairs[0].labour"`)
    pub field: String,
    /// Human-readable reason
    pub reason: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Every offending field of a rejected payload, in the order they were found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: impl Into<String>, reason: impl Into<String>) {
        self.0.push(FieldError::new(field, reason));
    }

    /// Appends another set of errors, prefixing each field name.
    pub fn extend_prefixed(&mut self, prefix: &str, other: ValidationErrors) {
        self.0.extend(other.0.into_iter().map(|e| FieldError {
            field: format!("{prefix}{}", e.field),
            reason: e.reason,
        }));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> &[FieldError] {
        &self.0
    }

    /// Returns `true` if `field` was rejected.
    pub fn contains(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    /// `Ok(())` when nothing was recorded, otherwise `ValidationFailed`.
    pub fn into_result(self) -> Result<(), AppError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::ValidationFailed(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.reason))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

/// Application-level error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// No caller identity was presented.
    #[error("Authentication required: {0}")]
    AuthenticationRequired(String),

    /// The caller is known but lacks the admin capability.
    #[error("Authorization denied: {0}")]
    AuthorizationDenied(String),

    /// The payload was well-formed but failed field checks.
    #[error("Validation failed: {0}")]
    ValidationFailed(ValidationErrors),

    /// The payload could not be parsed as a JSON document.
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Storage error: {0}")]
    Storage(#[from] redb::Error),

    /// A stored record could not be decoded or encoded.
    #[error("Corrupt record: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Convenience alias for fallible operations.
pub type AppResult<T> = Result<T, AppError>;

macro_rules! storage_error_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for AppError {
                fn from(err: $ty) -> Self {
                    AppError::Storage(redb::Error::from(err))
                }
            }
        )*
    };
}

storage_error_from!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

impl AppError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        AppError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Stable machine-readable code used in response bodies.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::AuthenticationRequired(_) => "AUTHENTICATION_REQUIRED",
            AppError::AuthorizationDenied(_) => "AUTHORIZATION_DENIED",
            AppError::ValidationFailed(_) => "VALIDATION_FAILED",
            AppError::MalformedInput(_) => "MALFORMED_INPUT",
            AppError::NotFound { .. } => "NOT_FOUND",
            AppError::Storage(_) | AppError::Corrupt(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::AuthenticationRequired(_) => StatusCode::UNAUTHORIZED,
            AppError::AuthorizationDenied(_) => StatusCode::FORBIDDEN,
            AppError::ValidationFailed(_) | AppError::MalformedInput(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Storage(_) | AppError::Corrupt(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let body = match &self {
            AppError::ValidationFailed(fields) => json!({
                "error": "Validation failed",
                "code": code,
                "fields": fields,
            }),
            AppError::Storage(err) => {
                tracing::error!(error = %err, "Storage error");
                json!({ "error": "An internal error occurred", "code": code })
            }
            AppError::Corrupt(err) => {
                tracing::error!(error = %err, "Corrupt record");
                json!({ "error": "An internal error occurred", "code": code })
            }
            AppError::AuthenticationRequired(msg)
            | AppError::AuthorizationDenied(msg)
            | AppError::MalformedInput(msg) => json!({ "error": msg, "code": code }),
            AppError::NotFound { .. } => json!({ "error": self.to_string(), "code": code }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_collect_in_order() {
        let mut errors = ValidationErrors::new();
        errors.push("make", "is required");
        errors.push("year", "must be an integer");

        assert!(errors.contains("make"));
        assert!(!errors.contains("model"));
        assert_eq!(errors.to_string(), "make: is required; year: must be an integer");
        assert!(errors.into_result().is_err());
    }

    #[test]
    fn prefixed_errors_keep_reason() {
        let mut inner = ValidationErrors::new();
        inner.push("model", "is required");

        let mut outer = ValidationErrors::new();
        outer.extend_prefixed("[2].", inner);

        assert_eq!(outer.fields()[0].field, "[2].model");
        assert_eq!(outer.fields()[0].reason, "is required");
    }

    #[test]
    fn statuses_distinguish_every_kind() {
        assert_eq!(
            AppError::AuthenticationRequired("x".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::AuthorizationDenied("x".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(AppError::not_found("Listing", "abc").status(), StatusCode::NOT_FOUND);
        assert_ne!(
            AppError::MalformedInput("x".into()).code(),
            AppError::ValidationFailed(ValidationErrors::new()).code()
        );
    }
}
