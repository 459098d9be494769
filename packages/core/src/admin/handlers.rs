//! Admin pages for managing students.
//!
//! Routes (mounted under `/admin`):
//! - `GET  /students`        — student list
//! - `GET  /students/create` — "Add Student" form
//! - `POST /students`        — create a student from the form

use axum::{
    extract::{rejection::FormRejection, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use super::{csrf, views};
use crate::api::auth::{unique_violation_to_validation, PROGRAM_NOT_FOUND};
use crate::error::AppError;
use crate::events::AccountEvent;
use crate::models::NewStudent;
use crate::security;
use crate::state::AppState;
use crate::validation::{self, FieldErrors, Nim};

#[derive(Debug, Deserialize)]
pub struct IndexQuery {
    pub created: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StudentForm {
    #[serde(rename = "_token")]
    pub token: Option<String>,
    pub nim: Option<String>,
    pub nama: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub status_aktif: Option<String>,
}

impl StudentForm {
    fn is_active(&self) -> bool {
        self.status_aktif.as_deref() == Some("1")
    }

    fn old_input(&self) -> views::OldInput {
        views::OldInput {
            nim: self.nim.clone().unwrap_or_default(),
            nama: self.nama.clone().unwrap_or_default(),
            email: self.email.clone().unwrap_or_default(),
            status_aktif: self.is_active(),
        }
    }
}

/// Renders an [`AppError`] as an HTML page instead of JSON.
#[derive(Debug)]
pub struct AdminError(AppError);

impl From<AppError> for AdminError {
    fn from(err: AppError) -> Self {
        AdminError(err)
    }
}

impl From<sqlx::Error> for AdminError {
    fn from(err: sqlx::Error) -> Self {
        AdminError(AppError::Database(err))
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = self.0.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Admin request failed");
        }
        let title = status.canonical_reason().unwrap_or("Error");
        (status, Html(views::message_page(title, &self.0.public_message()))).into_response()
    }
}

/// "Page Expired", the conventional status for a failed CSRF check.
fn page_expired_status() -> StatusCode {
    StatusCode::from_u16(419).unwrap_or(StatusCode::FORBIDDEN)
}

/// `GET /admin/students`
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<IndexQuery>,
) -> Result<Html<String>, AdminError> {
    let students = state.repo.list_students().await?;
    Ok(Html(views::students_index(&students, query.created)))
}

/// `GET /admin/students/create`
pub async fn create() -> Response {
    let token = csrf::new_token();
    form_response(
        StatusCode::OK,
        &views::OldInput::default(),
        &FieldErrors::new(),
        &token,
    )
}

fn form_response(
    status: StatusCode,
    old: &views::OldInput,
    errors: &FieldErrors,
    token: &str,
) -> Response {
    let page = Html(views::student_create_form(old, errors, token));
    match csrf::cookie(token) {
        Some(cookie) => (status, [(header::SET_COOKIE, cookie)], page).into_response(),
        None => (status, page).into_response(),
    }
}

/// `POST /admin/students`
pub async fn store(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Form<StudentForm>, FormRejection>,
) -> Result<Response, AdminError> {
    let Form(form) = payload.map_err(AppError::from)?;

    if !csrf::verify(&headers, form.token.as_deref()) {
        tracing::warn!("Admin form rejected: CSRF token mismatch");
        return Ok((page_expired_status(), Html(views::page_expired())).into_response());
    }

    match store_student(&state, &form).await {
        Ok(nim) => {
            tracing::info!(nim, "Student created by admin");
            Ok(Redirect::to(&format!("{}?created={}", views::INDEX_PATH, nim)).into_response())
        }
        Err(AppError::Validation(errors)) => {
            let old = form.old_input();
            let token = form.token.unwrap_or_else(csrf::new_token);
            Ok(form_response(
                StatusCode::UNPROCESSABLE_ENTITY,
                &old,
                &errors,
                &token,
            ))
        }
        Err(err) => Err(err.context("Failed to create student.").into()),
    }
}

async fn store_student(state: &AppState, form: &StudentForm) -> Result<i64, AppError> {
    let mut errors = FieldErrors::new();

    let nim_value = form.nim.as_ref().map(|raw| Value::String(raw.trim().to_string()));
    let nim = validation::check_nim(&mut errors, "nim", nim_value.as_ref());
    let name = validation::check_name(&mut errors, "nama", form.nama.as_deref());
    let email = match form.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
        Some(raw) => validation::check_institution_email(
            &mut errors,
            "email",
            raw,
            &state.config.institution_domain,
        ),
        None => None,
    };
    let password = match form.password.as_deref().filter(|p| !p.is_empty()) {
        Some(raw) => validation::check_password(&mut errors, "password", Some(raw), None),
        None => None,
    };

    if let Some(nim) = nim {
        if state.repo.nim_taken(nim.as_i64()).await? {
            errors.add("nim", validation::taken("nim"));
        } else if state.repo.find_program(&nim.program_code()).await?.is_none() {
            errors.add("nim", PROGRAM_NOT_FOUND);
        }
    }
    if let Some(email) = &email {
        if state.repo.email_taken(email).await? {
            errors.add("email", validation::taken("email"));
        }
    }

    errors.into_result().map_err(AppError::Validation)?;
    let (Some(nim), Some(name)) = (nim, name) else {
        return Err(AppError::BadRequest("Validation error.".to_string()));
    };

    insert_student(state, nim, name, email, password, form.is_active()).await
}

async fn insert_student(
    state: &AppState,
    nim: Nim,
    name: String,
    email: Option<String>,
    password: Option<String>,
    active: bool,
) -> Result<i64, AppError> {
    let password_hash = match password {
        Some(password) => security::hash_password(&password)?,
        None => security::unusable_password_hash()?,
    };
    let now = Utc::now();
    let new_student = NewStudent {
        nim,
        email_verified_at: email.as_ref().map(|_| now),
        name,
        email,
        password_hash,
        active,
    };

    let mut tx = state.repo.begin().await?;
    let student = state
        .repo
        .insert_student(&mut tx, &new_student, now)
        .await
        .map_err(unique_violation_to_validation)?;
    AccountEvent::Registered(&student).dispatch(state, &mut tx).await?;
    tx.commit().await?;

    Ok(student.nim)
}
