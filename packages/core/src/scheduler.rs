//! Background pruning of expired rows.
//!
//! Each tick removes password reset requests past their useful life,
//! expired email verification links, and (when `TOKEN_TTL_MINUTES` is set)
//! access tokens older than the configured lifetime.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::signal;
use tokio::time;

use crate::state::AppState;

/// Rows removed by one pruning pass, per table.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PruneReport {
    pub password_resets: u64,
    pub email_verifications: u64,
    pub access_tokens: u64,
}

impl PruneReport {
    pub fn total(&self) -> u64 {
        self.password_resets + self.email_verifications + self.access_tokens
    }
}

/// Run the pruning loop until `Ctrl+C` (SIGINT) is received.
///
/// A failed pass is logged and retried on the next tick.
pub async fn run_pruning(state: AppState) {
    let interval_seconds = state.config.prune_interval_seconds;
    let mut interval = time::interval(Duration::from_secs(interval_seconds));

    tracing::info!("Pruner started (interval: {}s)", interval_seconds);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match prune_once(&state, Utc::now()).await {
                    Ok(report) if report.total() > 0 => {
                        tracing::info!(
                            password_resets = report.password_resets,
                            email_verifications = report.email_verifications,
                            access_tokens = report.access_tokens,
                            "Pruned expired rows"
                        );
                    }
                    Ok(_) => tracing::debug!("Nothing to prune"),
                    Err(err) => tracing::error!("Pruning failed, retrying next tick: {}", err),
                }
            }

            _ = signal::ctrl_c() => {
                tracing::info!("Shutdown signal received. Stopping pruner.");
                break;
            }
        }
    }

    tracing::info!("Pruner stopped cleanly");
}

/// Execute a single pruning pass as of `now`. Extracted for testability.
pub async fn prune_once(state: &AppState, now: DateTime<Utc>) -> Result<PruneReport, sqlx::Error> {
    let repo = &state.repo;
    let config = &state.config;

    let mut report = PruneReport {
        password_resets: repo
            .prune_password_resets(now - config.password_reset_retention())
            .await?,
        email_verifications: repo.prune_email_verifications(now).await?,
        access_tokens: 0,
    };
    if let Some(ttl) = config.token_ttl() {
        report.access_tokens = repo.prune_access_tokens(now - ttl).await?;
    }

    state.metrics.pruned_rows_total.inc_by(report.total() as f64);
    Ok(report)
}
