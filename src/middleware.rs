//! Caller identification and the admin gate
//!
//! Every listing operation receives proof of who is calling: a [`Viewer`] for
//! authenticated reads and an [`AdminAccess`] for writes and the admin view.
//! Both can only be built by [`authenticate`] and [`require_admin`], so an
//! admin repository method cannot be reached without passing the gate.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::database::{find_user_by_token, AppState};
use crate::error::AppError;
use crate::model::User;

/// An authenticated caller
#[derive(Debug, Clone)]
pub struct Viewer(User);

impl Viewer {
    pub fn user(&self) -> &User {
        &self.0
    }
}

/// An authenticated caller holding the admin capability
#[derive(Debug, Clone)]
pub struct AdminAccess(User);

impl AdminAccess {
    pub fn user(&self) -> &User {
        &self.0
    }
}

/// Fails with `AuthenticationRequired` when no caller identity is present.
pub fn authenticate(caller: Option<User>) -> Result<Viewer, AppError> {
    caller.map(Viewer).ok_or_else(|| {
        AppError::AuthenticationRequired("User must be authenticated to view listings".to_string())
    })
}

/// The single authorization gate for admin operations.
pub fn require_admin(caller: Option<User>) -> Result<AdminAccess, AppError> {
    let viewer = authenticate(caller)?;
    if !viewer.0.is_admin {
        tracing::warn!(user_id = %viewer.0.id, "Non-admin caller rejected from admin operation");
        return Err(AppError::AuthorizationDenied(
            "Only admins can manage listings".to_string(),
        ));
    }
    Ok(AdminAccess(viewer.0))
}

/// Resolves the `Authorization: Bearer <token>` header to a user.
///
/// A missing header, a non-bearer scheme and an unknown token are all
/// `AuthenticationRequired`.
async fn caller_from_parts(parts: &Parts, state: &AppState) -> Result<Option<User>, AppError> {
    let Some(header) = parts.headers.get("authorization") else {
        return Ok(None);
    };

    let token = header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            AppError::AuthenticationRequired(
                "Invalid Authorization format. Expected: Bearer <token>".to_string(),
            )
        })?;

    match find_user_by_token(&state.db, token)? {
        Some(user) => Ok(Some(user)),
        None => Err(AppError::AuthenticationRequired(
            "Invalid or unknown token".to_string(),
        )),
    }
}

impl FromRequestParts<AppState> for Viewer {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authenticate(caller_from_parts(parts, state).await?)
    }
}

impl FromRequestParts<AppState> for AdminAccess {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        require_admin(caller_from_parts(parts, state).await?)
    }
}
