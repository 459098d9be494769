pub mod auth;
pub mod extract;
pub mod health;
pub mod verification;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::admin;
use crate::metrics::{metrics_handler, track_http};
use crate::state::AppState;

/// Assemble the full application router: JSON API under `/api`, the admin
/// pages under `/admin` when admin credentials are configured, plus
/// `/health` and `/metrics`.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/verify-otp", post(auth::verify_otp))
        .route("/reset-password", post(auth::reset_password))
        .route("/email/verify", get(verification::verify_email))
        .route("/email/resend", post(verification::resend_verification))
        .layer(CorsLayer::permissive());

    let mut app = Router::new()
        .route("/health", get(health::health))
        .route("/metrics", get(metrics_handler))
        .nest("/api", api);

    match admin::router(&state) {
        Some(admin) => app = app.nest("/admin", admin),
        None => tracing::info!("ADMIN_PASSWORD not set; admin pages disabled"),
    }

    app.layer(middleware::from_fn_with_state(state.metrics.clone(), track_http))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::HashMap;
    use std::sync::Arc;

    use chrono::Utc;

    use crate::config::Config;
    use crate::db::create_pool;
    use crate::mail::MemoryMailer;
    use crate::metrics::AppMetrics;
    use crate::models::NewStudent;
    use crate::security;
    use crate::state::AppState;
    use crate::validation::Nim;

    pub async fn make_state_with(vars: &[(&str, &str)]) -> (AppState, Arc<MemoryMailer>) {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let config = Config::from_vars(|key| vars.get(key).cloned()).unwrap();
        let pool = create_pool("sqlite::memory:").await.unwrap();
        let mailer = Arc::new(MemoryMailer::new());
        let metrics = Arc::new(AppMetrics::new().unwrap());
        (AppState::new(config, pool, mailer.clone(), metrics), mailer)
    }

    pub async fn make_state() -> (AppState, Arc<MemoryMailer>) {
        make_state_with(&[]).await
    }

    pub async fn seed_student(
        state: &AppState,
        nim: i64,
        email: &str,
        password: &str,
        verified: bool,
    ) {
        let student = NewStudent {
            nim: Nim::try_from(nim).unwrap(),
            name: "Budi Santoso".to_string(),
            email: Some(email.to_string()),
            password_hash: security::hash_password(password).unwrap(),
            active: true,
            email_verified_at: verified.then(Utc::now),
        };
        let mut tx = state.repo.begin().await.unwrap();
        state
            .repo
            .insert_student(&mut tx, &student, Utc::now())
            .await
            .unwrap();
        tx.commit().await.unwrap();
    }
}
