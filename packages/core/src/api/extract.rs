//! Bearer-token authentication for API routes.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::Utc;
use subtle::ConstantTimeEq;

use crate::error::AppError;
use crate::models::Student;
use crate::security::{hash_token, parse_access_token};
use crate::state::AppState;

pub const UNAUTHENTICATED: &str = "Unauthenticated.";

/// The student owning the bearer token of the current request.
#[derive(Debug, Clone)]
pub struct AuthenticatedStudent {
    pub student: Student,
    pub token_id: i64,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedStudent {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let raw = bearer_token(parts).ok_or(AppError::Unauthorized(UNAUTHENTICATED))?;
        let (token_id, secret) =
            parse_access_token(raw).ok_or(AppError::Unauthorized(UNAUTHENTICATED))?;

        let token = state
            .repo
            .find_access_token(token_id)
            .await?
            .ok_or(AppError::Unauthorized(UNAUTHENTICATED))?;

        if !bool::from(hash_token(secret).as_bytes().ct_eq(token.token_hash.as_bytes())) {
            tracing::warn!(token_id, "Bearer secret mismatch");
            return Err(AppError::Unauthorized(UNAUTHENTICATED));
        }

        let now = Utc::now();
        if let Some(ttl) = state.config.token_ttl() {
            if token.created_at + ttl < now {
                tracing::info!(token_id, "Expired access token presented");
                return Err(AppError::Unauthorized(UNAUTHENTICATED));
            }
        }

        let student = state
            .repo
            .find_student(token.student_nim)
            .await?
            .ok_or(AppError::Unauthorized(UNAUTHENTICATED))?;

        state.repo.touch_access_token(token_id, now).await?;

        Ok(Self { student, token_id })
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then_some(token.trim())
}
