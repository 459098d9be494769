//! Account lifecycle events and their listeners.
//!
//! Events are dispatched inside the caller's transaction, so a listener
//! failure on `Registered` rolls the registration back.

use chrono::Utc;
use sqlx::SqliteConnection;

use crate::error::AppError;
use crate::mail::templates;
use crate::models::Student;
use crate::security;
use crate::state::AppState;

#[derive(Debug, Clone, Copy)]
pub enum AccountEvent<'a> {
    Registered(&'a Student),
    PasswordReset(&'a Student),
}

impl AccountEvent<'_> {
    pub async fn dispatch(
        self,
        state: &AppState,
        conn: &mut SqliteConnection,
    ) -> Result<(), AppError> {
        match self {
            AccountEvent::Registered(student) => {
                tracing::info!(nim = student.nim, "Student registered");
                state.metrics.registrations_total.inc();
                if student.email.is_some() && !student.has_verified_email() {
                    send_verification_link(state, conn, student).await?;
                }
                Ok(())
            }
            AccountEvent::PasswordReset(student) => {
                tracing::info!(nim = student.nim, "Password reset");
                state.metrics.password_resets_total.inc();
                if let Some(email) = &student.email {
                    let notice = templates::password_changed(email, &student.name);
                    if let Err(err) = state.mailer.send(notice).await {
                        state.metrics.mail_failures_total.inc();
                        tracing::warn!(nim = student.nim, "Password change notice not sent: {}", err);
                    }
                }
                Ok(())
            }
        }
    }
}

/// Store a fresh verification token for `student` and mail its link.
pub async fn send_verification_link(
    state: &AppState,
    conn: &mut SqliteConnection,
    student: &Student,
) -> Result<(), AppError> {
    let Some(email) = student.email.as_deref() else {
        return Ok(());
    };

    let secret = security::random_secret(security::TOKEN_SECRET_LEN);
    let now = Utc::now();
    state
        .repo
        .insert_email_verification(
            conn,
            student.nim,
            &security::hash_token(&secret),
            now,
            now + state.config.verification_ttl(),
        )
        .await?;

    let link = format!("{}/api/email/verify?token={}", state.config.app_url, secret);
    let mail = templates::email_verification(
        email,
        &student.name,
        &link,
        state.config.verification_ttl_minutes,
    );

    state.mailer.send(mail).await.map_err(|err| {
        state.metrics.mail_failures_total.inc();
        AppError::from(err)
    })?;

    tracing::debug!(nim = student.nim, "Verification link sent");
    Ok(())
}
