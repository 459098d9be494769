//! Email address verification.
//!
//! Routes:
//! - `GET  /api/email/verify?token=...` — confirm the address from the mailed link
//! - `POST /api/email/resend`           — mail a fresh link

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use super::auth::ACCOUNT_NOT_FOUND;
use crate::error::AppError;
use crate::events::send_verification_link;
use crate::security;
use crate::state::AppState;
use crate::validation::{self, FieldErrors};

pub const INVALID_LINK: &str = "Invalid or expired verification link.";

#[derive(Debug, Deserialize)]
pub struct VerifyEmailQuery {
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResendRequest {
    pub email: Option<String>,
}

/// `GET /api/email/verify`
pub async fn verify_email(
    State(state): State<AppState>,
    Query(query): Query<VerifyEmailQuery>,
) -> Result<Json<Value>, AppError> {
    let mut errors = FieldErrors::new();
    let token = validation::check_required(&mut errors, "token", query.token.as_deref());
    errors.into_result().map_err(AppError::Validation)?;
    let Some(token) = token else {
        return Err(AppError::BadRequest("Validation error.".to_string()));
    };

    confirm_email(&state, &token)
        .await
        .map_err(|err| err.context("Email verification failed."))?;

    Ok(Json(json!({ "message": "Email verified." })))
}

async fn confirm_email(state: &AppState, token: &str) -> Result<(), AppError> {
    let now = Utc::now();
    let verification = state
        .repo
        .find_email_verification(&security::hash_token(token))
        .await?
        .filter(|v| v.expires_at >= now)
        .ok_or(AppError::NotFound(INVALID_LINK))?;

    let mut tx = state.repo.begin().await?;
    state
        .repo
        .mark_email_verified(&mut tx, verification.student_nim, now)
        .await?;
    state
        .repo
        .delete_email_verifications(&mut tx, verification.student_nim)
        .await?;
    tx.commit().await?;

    tracing::info!(nim = verification.student_nim, "Email verified");
    Ok(())
}

/// `POST /api/email/resend`
pub async fn resend_verification(
    State(state): State<AppState>,
    payload: Result<Json<ResendRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(body) = payload?;
    let message = resend_link(&state, body)
        .await
        .map_err(|err| err.context("Failed to send verification link."))?;

    Ok(Json(json!({ "message": message })))
}

async fn resend_link(state: &AppState, body: ResendRequest) -> Result<&'static str, AppError> {
    let mut errors = FieldErrors::new();
    let email = validation::check_email(&mut errors, "email", body.email.as_deref());
    errors.into_result().map_err(AppError::Validation)?;
    let Some(email) = email else {
        return Err(AppError::BadRequest("Validation error.".to_string()));
    };

    let student = state
        .repo
        .find_student_by_email(&email)
        .await?
        .ok_or(AppError::NotFound(ACCOUNT_NOT_FOUND))?;

    if student.has_verified_email() {
        return Ok("Email already verified.");
    }

    let mut tx = state.repo.begin().await?;
    send_verification_link(state, &mut tx, &student).await?;
    tx.commit().await?;

    Ok("Verification link sent.")
}
