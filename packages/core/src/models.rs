use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::validation::Nim;

/// A registered student. The password hash is never serialised.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Student {
    pub nim: i64,
    pub name: String,
    pub email: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub active: bool,
    pub program_code: String,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Student {
    pub fn has_verified_email(&self) -> bool {
        self.email.is_some() && self.email_verified_at.is_some()
    }
}

/// Student row joined with its program name, for listings.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StudentListing {
    pub nim: i64,
    pub name: String,
    pub email: Option<String>,
    pub active: bool,
    pub program_code: String,
    pub program_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProgramOfStudy {
    pub code: String,
    pub name: String,
}

/// Fields needed to insert a student.
#[derive(Debug, Clone)]
pub struct NewStudent {
    pub nim: Nim,
    pub name: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub active: bool,
    pub email_verified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccessToken {
    pub id: i64,
    pub student_nim: i64,
    pub name: String,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

/// One forgot-password request. `verified_at` and `token_hash` are set once
/// its OTP has been accepted.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PasswordResetRequest {
    pub id: i64,
    pub email: String,
    pub otp: String,
    pub created_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
    pub token_hash: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EmailVerification {
    pub id: i64,
    pub student_nim: i64,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
