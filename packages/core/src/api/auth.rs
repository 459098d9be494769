//! Student account endpoints.
//!
//! Routes:
//! - `POST /api/register`        — create an account and mail a verification link
//! - `POST /api/login`           — exchange NIM + password for a bearer token
//! - `POST /api/logout`          — revoke the token used for the request
//! - `GET  /api/me`              — the authenticated student
//! - `POST /api/forgot-password` — mail a one-time code
//! - `POST /api/verify-otp`      — trade a code for a reset token
//! - `POST /api/reset-password`  — set a new password with the reset token

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::SqliteConnection;

use super::extract::AuthenticatedStudent;
use crate::error::AppError;
use crate::events::AccountEvent;
use crate::mail::templates;
use crate::metrics::{LOGIN_INVALID_CREDENTIALS, LOGIN_SUCCESS, LOGIN_UNVERIFIED};
use crate::models::{NewStudent, Student};
use crate::security;
use crate::state::AppState;
use crate::validation::{self, FieldErrors, Nim};

pub const INVALID_CREDENTIALS: &str = "Invalid NIM or password.";
pub const EMAIL_NOT_VERIFIED: &str = "Email has not been verified.";
pub const PROGRAM_NOT_FOUND: &str = "The program of study code is not registered for this NIM.";
pub const ACCOUNT_NOT_FOUND: &str = "Account is not registered.";
pub const OTP_THROTTLED: &str = "Please wait before retrying.";
pub const INVALID_OTP: &str = "Invalid OTP code.";
pub const OTP_UNAVAILABLE: &str = "Too many pending codes. Please try again later.";
pub const RESET_USER: &str = "We can't find a user with that email address.";
pub const RESET_TOKEN: &str = "This password reset token is invalid.";
pub const RESET_DONE: &str = "Your password has been reset.";

const OTP_ATTEMPTS: usize = 10;

type JsonResult = Result<Json<Value>, AppError>;

// ---- Request / response shapes ----

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub nim: Option<Value>,
    #[serde(alias = "name")]
    pub nama: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub password_confirmation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub nim: Option<Value>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: &'static str,
    pub mahasiswa: Student,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub otp: Option<Value>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub password_confirmation: Option<String>,
}

// ---- Handlers ----

/// `POST /api/register`
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let Json(body) = payload?;
    register_student(&state, body)
        .await
        .map_err(|err| err.context("Registration failed."))?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Registration successful." })),
    ))
}

async fn register_student(state: &AppState, body: RegisterRequest) -> Result<(), AppError> {
    let mut errors = FieldErrors::new();

    let nim = validation::check_nim(&mut errors, "nim", body.nim.as_ref());
    let name = validation::check_name(&mut errors, "nama", body.nama.as_deref());
    let email = match body.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
        Some(raw) => validation::check_institution_email(
            &mut errors,
            "email",
            raw,
            &state.config.institution_domain,
        ),
        None => {
            errors.add("email", validation::required("email"));
            None
        }
    };
    let password = validation::check_password(
        &mut errors,
        "password",
        body.password.as_deref(),
        Some(body.password_confirmation.as_deref()),
    );

    if let Some(nim) = nim {
        if state.repo.nim_taken(nim.as_i64()).await? {
            errors.add("nim", validation::taken("nim"));
        }
    }
    if let Some(email) = &email {
        if state.repo.email_taken(email).await? {
            errors.add("email", validation::taken("email"));
        }
    }

    errors.into_result().map_err(AppError::Validation)?;
    let (Some(nim), Some(name), Some(email), Some(password)) = (nim, name, email, password) else {
        return Err(AppError::BadRequest("Validation error.".to_string()));
    };

    if state.repo.find_program(&nim.program_code()).await?.is_none() {
        return Err(AppError::NotFound(PROGRAM_NOT_FOUND));
    }

    let new_student = NewStudent {
        nim,
        name,
        email: Some(email),
        password_hash: security::hash_password(&password)?,
        active: true,
        email_verified_at: None,
    };

    let mut tx = state.repo.begin().await?;
    let student = state
        .repo
        .insert_student(&mut tx, &new_student, Utc::now())
        .await
        .map_err(unique_violation_to_validation)?;
    AccountEvent::Registered(&student).dispatch(state, &mut tx).await?;
    tx.commit().await?;

    Ok(())
}

/// A concurrent insert can win between the uniqueness check and ours.
pub(crate) fn unique_violation_to_validation(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            let field = if db.message().contains("email") { "email" } else { "nim" };
            return AppError::validation(field, validation::taken(field));
        }
    }
    AppError::Database(err)
}

/// `POST /api/login`
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError> {
    let Json(body) = payload?;
    login_student(&state, body)
        .await
        .map_err(|err| err.context("Login failed."))
        .map(Json)
}

async fn login_student(state: &AppState, body: LoginRequest) -> Result<LoginResponse, AppError> {
    let mut errors = FieldErrors::new();
    let nim_value = match body.nim {
        None | Some(Value::Null) => {
            errors.add("nim", validation::required("nim"));
            None
        }
        Some(Value::String(s)) if s.trim().is_empty() => {
            errors.add("nim", validation::required("nim"));
            None
        }
        Some(value) => Some(value),
    };
    let password = body.password.filter(|p| !p.is_empty());
    if password.is_none() {
        errors.add("password", validation::required("password"));
    }
    errors.into_result().map_err(AppError::Validation)?;
    let (Some(nim_value), Some(password)) = (nim_value, password) else {
        return Err(AppError::BadRequest("Validation error.".to_string()));
    };

    let student = match Nim::from_json(&nim_value) {
        Ok(nim) => state.repo.find_student(nim.as_i64()).await?,
        Err(_) => None,
    };

    let student = match student {
        Some(student) if security::verify_password(&password, &student.password_hash) => student,
        _ => {
            tracing::info!(nim = %nim_value, "Login rejected: invalid credentials");
            state.metrics.record_login(LOGIN_INVALID_CREDENTIALS);
            return Err(AppError::Unauthorized(INVALID_CREDENTIALS));
        }
    };

    if !student.has_verified_email() {
        tracing::info!(nim = student.nim, "Login rejected: email not verified");
        state.metrics.record_login(LOGIN_UNVERIFIED);
        return Err(AppError::Unauthorized(EMAIL_NOT_VERIFIED));
    }

    let secret = security::random_secret(security::TOKEN_SECRET_LEN);
    let token_id = state
        .repo
        .create_access_token(
            student.nim,
            &format!("login:{}", student.nim),
            &security::hash_token(&secret),
            Utc::now(),
        )
        .await?;

    tracing::info!(nim = student.nim, token_id, "Student logged in");
    state.metrics.record_login(LOGIN_SUCCESS);

    Ok(LoginResponse {
        message: "Login successful.",
        mahasiswa: student,
        token: security::format_access_token(token_id, &secret),
    })
}

/// `POST /api/logout`
pub async fn logout(State(state): State<AppState>, auth: AuthenticatedStudent) -> JsonResult {
    state
        .repo
        .delete_access_token(auth.token_id)
        .await
        .map_err(|err| AppError::from(err).context("Logout failed."))?;

    tracing::info!(nim = auth.student.nim, "Student logged out");
    Ok(Json(json!({ "message": "Logout successful." })))
}

/// `GET /api/me`
pub async fn me(auth: AuthenticatedStudent) -> JsonResult {
    Ok(Json(json!({ "mahasiswa": auth.student })))
}

/// `POST /api/forgot-password`
pub async fn forgot_password(
    State(state): State<AppState>,
    payload: Result<Json<ForgotPasswordRequest>, JsonRejection>,
) -> JsonResult {
    let Json(body) = payload?;
    send_reset_otp(&state, body)
        .await
        .map_err(|err| err.context("Failed to send OTP code."))?;

    Ok(Json(json!({ "message": "OTP code sent." })))
}

async fn send_reset_otp(state: &AppState, body: ForgotPasswordRequest) -> Result<(), AppError> {
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
    let email = student.email.unwrap_or(email);

    let now = Utc::now();
    let mut tx = state.repo.begin().await?;

    if let Some(latest) = state.repo.latest_password_reset_at(&mut tx, &email).await? {
        if now - latest < state.config.otp_throttle() {
            return Err(AppError::TooManyRequests(OTP_THROTTLED));
        }
    }

    let otp = unused_otp(state, &mut tx, now - state.config.otp_ttl()).await?;

    state
        .repo
        .insert_password_reset(&mut tx, &email, &otp, now)
        .await?;

    let mail = templates::password_reset_otp(&email, &otp, state.config.otp_ttl_minutes);
    if let Err(err) = state.mailer.send(mail).await {
        state.metrics.mail_failures_total.inc();
        return Err(err.into());
    }

    tx.commit().await?;

    state.metrics.otp_sent_total.inc();
    tracing::info!(nim = student.nim, "Password reset OTP sent");
    Ok(())
}

/// Draw codes until one matches no live request. Gives up with 429 when
/// every attempt collides.
async fn unused_otp(
    state: &AppState,
    conn: &mut SqliteConnection,
    not_before: DateTime<Utc>,
) -> Result<String, AppError> {
    for _ in 0..OTP_ATTEMPTS {
        let otp = security::generate_otp();
        if !state.repo.otp_in_use(conn, &otp, not_before).await? {
            return Ok(otp);
        }
    }
    tracing::warn!(attempts = OTP_ATTEMPTS, "No free OTP code found");
    Err(AppError::TooManyRequests(OTP_UNAVAILABLE))
}

/// `POST /api/verify-otp`
///
/// Without `email` the code alone selects the request, so two live codes
/// must never collide; `send_reset_otp` retries to keep them unique.
pub async fn verify_otp(
    State(state): State<AppState>,
    payload: Result<Json<VerifyOtpRequest>, JsonRejection>,
) -> JsonResult {
    let Json(body) = payload?;
    check_reset_otp(&state, body)
        .await
        .map_err(|err| err.context("OTP verification failed."))
        .map(Json)
}

async fn check_reset_otp(state: &AppState, body: VerifyOtpRequest) -> Result<Value, AppError> {
    let mut errors = FieldErrors::new();
    let otp = validation::check_otp(&mut errors, "otp", body.otp.as_ref());
    let email = match body.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
        Some(raw) => validation::check_email(&mut errors, "email", Some(raw)),
        None => None,
    };
    errors.into_result().map_err(AppError::Validation)?;
    let Some(otp) = otp else {
        return Err(AppError::BadRequest("Validation error.".to_string()));
    };

    let now = Utc::now();
    let request = state
        .repo
        .find_pending_otp(&otp, email.as_deref(), now - state.config.otp_ttl())
        .await?
        .ok_or(AppError::NotFound(INVALID_OTP))?;

    let secret = security::random_secret(security::TOKEN_SECRET_LEN);
    if !state
        .repo
        .mark_otp_verified(request.id, &security::hash_token(&secret), now)
        .await?
    {
        return Err(AppError::NotFound(INVALID_OTP));
    }

    tracing::info!(request_id = request.id, "Password reset OTP accepted");
    Ok(json!({
        "message": "OTP code is valid.",
        "email": request.email,
        "token": secret,
    }))
}

/// `POST /api/reset-password`
pub async fn reset_password(
    State(state): State<AppState>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> JsonResult {
    let Json(body) = payload?;
    apply_password_reset(&state, body)
        .await
        .map_err(|err| err.context("Password reset failed."))?;

    Ok(Json(json!({ "message": RESET_DONE })))
}

async fn apply_password_reset(state: &AppState, body: ResetPasswordRequest) -> Result<(), AppError> {
    let mut errors = FieldErrors::new();
    let token = validation::check_required(&mut errors, "token", body.token.as_deref());
    let email = validation::check_email(&mut errors, "email", body.email.as_deref());
    let password = validation::check_password(
        &mut errors,
        "password",
        body.password.as_deref(),
        Some(body.password_confirmation.as_deref()),
    );
    errors.into_result().map_err(AppError::Validation)?;
    let (Some(token), Some(email), Some(password)) = (token, email, password) else {
        return Err(AppError::BadRequest("Validation error.".to_string()));
    };

    let student = state
        .repo
        .find_student_by_email(&email)
        .await?
        .ok_or_else(|| AppError::BadRequest(RESET_USER.to_string()))?;
    let email = student.email.clone().unwrap_or(email);

    let not_before = Utc::now() - state.config.reset_token_ttl();
    if state
        .repo
        .find_verified_reset(&email, &security::hash_token(&token), not_before)
        .await?
        .is_none()
    {
        tracing::warn!(nim = student.nim, "Password reset with invalid token");
        return Err(AppError::BadRequest(RESET_TOKEN.to_string()));
    }

    let password_hash = security::hash_password(&password)?;

    let mut tx = state.repo.begin().await?;
    state
        .repo
        .update_password(&mut tx, student.nim, &password_hash, Utc::now())
        .await?;
    state.repo.delete_password_resets(&mut tx, &email).await?;
    let revoked = state.repo.delete_access_tokens_for(&mut tx, student.nim).await?;
    AccountEvent::PasswordReset(&student).dispatch(state, &mut tx).await?;
    tx.commit().await?;

    tracing::debug!(nim = student.nim, revoked, "Access tokens revoked after reset");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Method, Request},
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use chrono::Duration;

    use crate::api::test_support::{make_state, make_state_with, seed_student};

    async fn post_json(app: axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn register_rejects_foreign_domain_and_short_password() {
        let (state, _mailer) = make_state().await;
        let app = crate::api::router(state);

        let (status, json) = post_json(
            app,
            "/api/register",
            json!({
                "nim": 211524001,
                "nama": "Budi",
                "email": "budi@gmail.com",
                "password": "123",
                "password_confirmation": "123"
            }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["errors"]["email"].is_array());
        assert!(json["errors"]["password"].is_array());
        assert!(json["errors"].get("nim").is_none());
    }

    #[tokio::test]
    async fn register_with_malformed_json_is_400() {
        let (state, _mailer) = make_state().await;
        let app = crate::api::router(state);
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/register")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn register_rolls_back_when_mail_fails() {
        let (state, mailer) = make_state().await;
        mailer.set_failing(true);
        let repo = state.repo.clone();
        let app = crate::api::router(state);

        let (status, json) = post_json(
            app,
            "/api/register",
            json!({
                "nim": "211524001",
                "nama": "Budi Santoso",
                "email": "budi@polban.ac.id",
                "password": "rahasia",
                "password_confirmation": "rahasia"
            }),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json, json!({ "message": "Registration failed." }));
        assert!(repo.find_student(211524001).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn login_requires_both_fields() {
        let (state, _mailer) = make_state().await;
        let app = crate::api::router(state);
        let (status, json) = post_json(app, "/api/login", json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["errors"]["nim"].is_array());
        assert!(json["errors"]["password"].is_array());
    }

    #[tokio::test]
    async fn login_response_never_contains_password_hash() {
        let (state, _mailer) = make_state().await;
        seed_student(&state, 211524001, "budi@polban.ac.id", "rahasia", true).await;
        let app = crate::api::router(state);

        let (status, json) = post_json(
            app,
            "/api/login",
            json!({ "nim": "211524001", "password": "rahasia" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["mahasiswa"]["nim"], 211524001);
        assert!(json["mahasiswa"].get("password_hash").is_none());
        assert!(json["token"].as_str().unwrap().contains('|'));
    }

    #[tokio::test]
    async fn non_numeric_nim_is_invalid_credentials() {
        let (state, _mailer) = make_state().await;
        let app = crate::api::router(state);
        let (status, json) = post_json(
            app,
            "/api/login",
            json!({ "nim": "budi", "password": "rahasia" }),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["message"], INVALID_CREDENTIALS);
    }

    #[tokio::test]
    async fn forgot_password_is_throttled() {
        let (state, mailer) = make_state().await;
        seed_student(&state, 211524001, "budi@polban.ac.id", "rahasia", true).await;
        let app = crate::api::router(state);

        let body = json!({ "email": "budi@polban.ac.id" });
        let (first, _) = post_json(app.clone(), "/api/forgot-password", body.clone()).await;
        let (second, json) = post_json(app, "/api/forgot-password", body).await;

        assert_eq!(first, StatusCode::OK);
        assert_eq!(second, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(json["message"], OTP_THROTTLED);
        assert_eq!(mailer.sent().await.len(), 1);
    }

    #[tokio::test]
    async fn forgot_password_rolls_back_when_mail_fails() {
        let (state, mailer) = make_state().await;
        seed_student(&state, 211524001, "budi@polban.ac.id", "rahasia", true).await;
        mailer.set_failing(true);
        let repo = state.repo.clone();
        let app = crate::api::router(state);

        let (status, json) = post_json(
            app,
            "/api/forgot-password",
            json!({ "email": "budi@polban.ac.id" }),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["message"], "Failed to send OTP code.");
        let mut conn = repo.pool().acquire().await.unwrap();
        assert!(repo
            .latest_password_reset_at(&mut conn, "budi@polban.ac.id")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn forgot_password_fails_when_every_code_is_taken() {
        let (state, mailer) = make_state().await;
        seed_student(&state, 211524001, "budi@polban.ac.id", "rahasia", true).await;
        let now = Utc::now();
        let mut tx = state.repo.begin().await.unwrap();
        for code in 1000..=9999 {
            state
                .repo
                .insert_password_reset(&mut tx, "ani@polban.ac.id", &code.to_string(), now)
                .await
                .unwrap();
        }
        tx.commit().await.unwrap();
        let repo = state.repo.clone();
        let app = crate::api::router(state);

        let (status, json) = post_json(
            app,
            "/api/forgot-password",
            json!({ "email": "budi@polban.ac.id" }),
        )
        .await;

        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(json["message"], OTP_UNAVAILABLE);
        assert!(mailer.sent().await.is_empty());
        let mut conn = repo.pool().acquire().await.unwrap();
        assert!(repo
            .latest_password_reset_at(&mut conn, "budi@polban.ac.id")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn expired_access_token_is_rejected() {
        let (state, _mailer) = make_state_with(&[("TOKEN_TTL_MINUTES", "1")]).await;
        seed_student(&state, 211524001, "budi@polban.ac.id", "rahasia", true).await;
        let stale = state
            .repo
            .create_access_token(
                211524001,
                "login",
                &security::hash_token("old-secret"),
                Utc::now() - Duration::minutes(5),
            )
            .await
            .unwrap();
        let fresh = state
            .repo
            .create_access_token(211524001, "login", &security::hash_token("new-secret"), Utc::now())
            .await
            .unwrap();
        let app = crate::api::router(state);

        let me = |bearer: String| {
            Request::builder()
                .uri("/api/me")
                .header("authorization", format!("Bearer {}", bearer))
                .body(Body::empty())
                .unwrap()
        };

        let resp = app
            .clone()
            .oneshot(me(security::format_access_token(stale, "old-secret")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = app
            .oneshot(me(security::format_access_token(fresh, "new-secret")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn expired_otp_is_not_found() {
        let (state, _mailer) = make_state().await;
        seed_student(&state, 211524001, "budi@polban.ac.id", "rahasia", true).await;
        let mut tx = state.repo.begin().await.unwrap();
        state
            .repo
            .insert_password_reset(
                &mut tx,
                "budi@polban.ac.id",
                "4321",
                Utc::now() - Duration::minutes(20),
            )
            .await
            .unwrap();
        tx.commit().await.unwrap();
        let app = crate::api::router(state);

        let (status, json) = post_json(app, "/api/verify-otp", json!({ "otp": "4321" })).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["message"], INVALID_OTP);
    }

    #[tokio::test]
    async fn expired_reset_token_is_rejected() {
        let (state, _mailer) = make_state().await;
        seed_student(&state, 211524001, "budi@polban.ac.id", "rahasia", true).await;
        let issued = Utc::now() - Duration::minutes(70);
        let mut tx = state.repo.begin().await.unwrap();
        let id = state
            .repo
            .insert_password_reset(&mut tx, "budi@polban.ac.id", "4321", issued)
            .await
            .unwrap();
        tx.commit().await.unwrap();
        assert!(state
            .repo
            .mark_otp_verified(
                id,
                &security::hash_token("reset-secret"),
                Utc::now() - Duration::minutes(61),
            )
            .await
            .unwrap());
        let repo = state.repo.clone();
        let app = crate::api::router(state);

        let (status, json) = post_json(
            app,
            "/api/reset-password",
            json!({
                "token": "reset-secret",
                "email": "budi@polban.ac.id",
                "password": "baru123",
                "password_confirmation": "baru123"
            }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], RESET_TOKEN);
        let student = repo.find_student(211524001).await.unwrap().unwrap();
        assert!(security::verify_password("rahasia", &student.password_hash));
    }

    #[tokio::test]
    async fn verify_otp_rejects_malformed_code() {
        let (state, _mailer) = make_state().await;
        let app = crate::api::router(state);
        let (status, json) = post_json(app, "/api/verify-otp", json!({ "otp": "12a4" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["errors"]["otp"].is_array());
    }

    #[tokio::test]
    async fn reset_password_unknown_email() {
        let (state, _mailer) = make_state().await;
        let app = crate::api::router(state);
        let (status, json) = post_json(
            app,
            "/api/reset-password",
            json!({
                "token": "whatever",
                "email": "ghost@polban.ac.id",
                "password": "baru123",
                "password_confirmation": "baru123"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], RESET_USER);
    }
}
