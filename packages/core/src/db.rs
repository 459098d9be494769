//! SQLite pool construction and schema migrations.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::error::AppError;

/// Open a pool for `database_url` and apply the embedded migrations.
///
/// In-memory databases live inside a single connection, so they get a
/// one-connection pool that never recycles it.
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, AppError> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = if database_url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await?
    };

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::debug!("Database ready at {}", database_url);

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Row;

    #[tokio::test]
    async fn memory_pool_has_schema_and_seeded_programs() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM programs_of_study")
            .fetch_one(&pool)
            .await
            .unwrap();
        let count: i64 = row.try_get("cnt").unwrap();
        assert!(count >= 2);
    }

    #[tokio::test]
    async fn foreign_keys_are_enforced() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        let result = sqlx::query(
            "INSERT INTO students (nim, name, password_hash, program_code, created_at, updated_at)
             VALUES (219999001, 'Nobody', 'x', '9999', '', '')",
        )
        .execute(&pool)
        .await;
        assert!(result.is_err());
    }
}
