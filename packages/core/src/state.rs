use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::mail::Mailer;
use crate::metrics::AppMetrics;
use crate::repository::StudentRepository;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub repo: Arc<StudentRepository>,
    pub mailer: Arc<dyn Mailer>,
    pub metrics: Arc<AppMetrics>,
}

impl AppState {
    pub fn new(
        config: Config,
        pool: SqlitePool,
        mailer: Arc<dyn Mailer>,
        metrics: Arc<AppMetrics>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            repo: Arc::new(StudentRepository::new(pool)),
            mailer,
            metrics,
        }
    }
}

impl FromRef<AppState> for Arc<AppMetrics> {
    fn from_ref(state: &AppState) -> Self {
        state.metrics.clone()
    }
}
