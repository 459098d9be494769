//! Database repository for students and their credentials.
//!
//! All SQLite read/write logic lives here. Methods on [`StudentRepository`]
//! that take a `&mut SqliteConnection` are meant to run inside a
//! transaction opened with [`StudentRepository::begin`]; the rest use the
//! pool directly.
//!
//! Timestamps are bound as `DateTime<Utc>` and stored as RFC 3339 text, so
//! range comparisons in SQL are lexicographic on a uniform format.

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};

use crate::models::{
    AccessToken, EmailVerification, NewStudent, PasswordResetRequest, ProgramOfStudy, Student,
    StudentListing,
};

/// Repository for reading and writing student data to SQLite.
pub struct StudentRepository {
    pool: SqlitePool,
}

impl StudentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
        self.pool.begin().await
    }

    // ---- Programs of study ----

    pub async fn find_program(&self, code: &str) -> Result<Option<ProgramOfStudy>, sqlx::Error> {
        sqlx::query_as::<_, ProgramOfStudy>(
            "SELECT code, name FROM programs_of_study WHERE code = ?",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
    }

    // ---- Students ----

    pub async fn find_student(&self, nim: i64) -> Result<Option<Student>, sqlx::Error> {
        sqlx::query_as::<_, Student>("SELECT * FROM students WHERE nim = ?")
            .bind(nim)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn find_student_by_email(&self, email: &str) -> Result<Option<Student>, sqlx::Error> {
        sqlx::query_as::<_, Student>("SELECT * FROM students WHERE email = ? COLLATE NOCASE")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn nim_taken(&self, nim: i64) -> Result<bool, sqlx::Error> {
        let found: Option<i64> = sqlx::query_scalar("SELECT nim FROM students WHERE nim = ?")
            .bind(nim)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    pub async fn email_taken(&self, email: &str) -> Result<bool, sqlx::Error> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT nim FROM students WHERE email = ? COLLATE NOCASE")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    pub async fn list_students(&self) -> Result<Vec<StudentListing>, sqlx::Error> {
        sqlx::query_as::<_, StudentListing>(
            "SELECT s.nim, s.name, s.email, s.active, s.program_code, p.name AS program_name
             FROM students s
             JOIN programs_of_study p ON p.code = s.program_code
             ORDER BY s.nim ASC",
        )
        .fetch_all(&self.pool)
        .await
    }

    pub async fn insert_student(
        &self,
        conn: &mut SqliteConnection,
        student: &NewStudent,
        now: DateTime<Utc>,
    ) -> Result<Student, sqlx::Error> {
        let nim = student.nim.as_i64();

        sqlx::query(
            "INSERT INTO students
             (nim, name, email, password_hash, active, program_code, email_verified_at, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(nim)
        .bind(&student.name)
        .bind(&student.email)
        .bind(&student.password_hash)
        .bind(student.active)
        .bind(student.nim.program_code())
        .bind(student.email_verified_at)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        sqlx::query_as::<_, Student>("SELECT * FROM students WHERE nim = ?")
            .bind(nim)
            .fetch_one(&mut *conn)
            .await
    }

    pub async fn update_password(
        &self,
        conn: &mut SqliteConnection,
        nim: i64,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE students SET password_hash = ?, updated_at = ? WHERE nim = ?")
                .bind(password_hash)
                .bind(now)
                .bind(nim)
                .execute(&mut *conn)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_email_verified(
        &self,
        conn: &mut SqliteConnection,
        nim: i64,
        now: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE students SET email_verified_at = COALESCE(email_verified_at, ?), updated_at = ?
             WHERE nim = ?",
        )
        .bind(now)
        .bind(now)
        .bind(nim)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    // ---- Access tokens ----

    /// Store a new token digest. Returns the new row id.
    pub async fn create_access_token(
        &self,
        student_nim: i64,
        name: &str,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO access_tokens (student_nim, name, token_hash, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(student_nim)
        .bind(name)
        .bind(token_hash)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn find_access_token(&self, id: i64) -> Result<Option<AccessToken>, sqlx::Error> {
        sqlx::query_as::<_, AccessToken>("SELECT * FROM access_tokens WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn touch_access_token(&self, id: i64, now: DateTime<Utc>) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE access_tokens SET last_used_at = ? WHERE id = ?")
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Returns `true` if the token existed.
    pub async fn delete_access_token(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM access_tokens WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_access_tokens_for(
        &self,
        conn: &mut SqliteConnection,
        student_nim: i64,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM access_tokens WHERE student_nim = ?")
            .bind(student_nim)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn count_access_tokens(&self, student_nim: i64) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM access_tokens WHERE student_nim = ?")
            .bind(student_nim)
            .fetch_one(&self.pool)
            .await
    }

    // ---- Password resets ----

    pub async fn insert_password_reset(
        &self,
        conn: &mut SqliteConnection,
        email: &str,
        otp: &str,
        now: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        let result =
            sqlx::query("INSERT INTO password_resets (email, otp, created_at) VALUES (?, ?, ?)")
                .bind(email)
                .bind(otp)
                .bind(now)
                .execute(&mut *conn)
                .await?;
        Ok(result.last_insert_rowid())
    }

    /// Whether an unverified code issued at or after `not_before` already
    /// uses `otp`.
    pub async fn otp_in_use(
        &self,
        conn: &mut SqliteConnection,
        otp: &str,
        not_before: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM password_resets
             WHERE otp = ? AND verified_at IS NULL AND created_at >= ?
             LIMIT 1",
        )
        .bind(otp)
        .bind(not_before)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(found.is_some())
    }

    pub async fn latest_password_reset_at(
        &self,
        conn: &mut SqliteConnection,
        email: &str,
    ) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT created_at FROM password_resets WHERE email = ? ORDER BY created_at DESC LIMIT 1",
        )
        .bind(email)
        .fetch_optional(&mut *conn)
        .await
    }

    /// Newest unverified request with this code issued at or after
    /// `not_before`, optionally restricted to one email.
    pub async fn find_pending_otp(
        &self,
        otp: &str,
        email: Option<&str>,
        not_before: DateTime<Utc>,
    ) -> Result<Option<PasswordResetRequest>, sqlx::Error> {
        sqlx::query_as::<_, PasswordResetRequest>(
            "SELECT * FROM password_resets
             WHERE otp = ?
               AND (? IS NULL OR email = ?)
               AND verified_at IS NULL
               AND created_at >= ?
             ORDER BY created_at DESC
             LIMIT 1",
        )
        .bind(otp)
        .bind(email)
        .bind(email)
        .bind(not_before)
        .fetch_optional(&self.pool)
        .await
    }

    /// Stamp a request as verified and bind it to a reset-token digest.
    /// Returns `false` if another request got there first.
    pub async fn mark_otp_verified(
        &self,
        id: i64,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE password_resets SET verified_at = ?, token_hash = ?
             WHERE id = ? AND verified_at IS NULL",
        )
        .bind(now)
        .bind(token_hash)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn find_verified_reset(
        &self,
        email: &str,
        token_hash: &str,
        not_before: DateTime<Utc>,
    ) -> Result<Option<PasswordResetRequest>, sqlx::Error> {
        sqlx::query_as::<_, PasswordResetRequest>(
            "SELECT * FROM password_resets
             WHERE email = ? AND token_hash = ? AND verified_at >= ?
             LIMIT 1",
        )
        .bind(email)
        .bind(token_hash)
        .bind(not_before)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn delete_password_resets(
        &self,
        conn: &mut SqliteConnection,
        email: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM password_resets WHERE email = ?")
            .bind(email)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }

    // ---- Email verification ----

    pub async fn insert_email_verification(
        &self,
        conn: &mut SqliteConnection,
        student_nim: i64,
        token_hash: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO email_verifications (student_nim, token_hash, created_at, expires_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(student_nim)
        .bind(token_hash)
        .bind(now)
        .bind(expires_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn find_email_verification(
        &self,
        token_hash: &str,
    ) -> Result<Option<EmailVerification>, sqlx::Error> {
        sqlx::query_as::<_, EmailVerification>(
            "SELECT * FROM email_verifications WHERE token_hash = ?",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn delete_email_verifications(
        &self,
        conn: &mut SqliteConnection,
        student_nim: i64,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM email_verifications WHERE student_nim = ?")
            .bind(student_nim)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }

    // ---- Pruning ----

    /// Delete password reset requests created before `cutoff`.
    pub async fn prune_password_resets(&self, cutoff: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM password_resets WHERE created_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete verification links that expired before `now`.
    pub async fn prune_email_verifications(&self, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM email_verifications WHERE expires_at < ?")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete access tokens created before `cutoff`.
    pub async fn prune_access_tokens(&self, cutoff: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM access_tokens WHERE created_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
