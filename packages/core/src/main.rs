use std::sync::Arc;

use clap::Parser;
use dotenvy::dotenv;
use tokio::net::TcpListener;

use student_portal::api;
use student_portal::cli::Cli;
use student_portal::config::Config;
use student_portal::db::create_pool;
use student_portal::error::AppError;
use student_portal::logging::init_logging;
use student_portal::mail::build_mailer;
use student_portal::metrics::AppMetrics;
use student_portal::scheduler::run_pruning;
use student_portal::state::AppState;

#[tokio::main]
async fn main() {
    dotenv().ok();
    init_logging();

    if let Err(err) = run(Cli::parse()).await {
        tracing::error!("{}", err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let mut config = Config::from_env().map_err(AppError::Config)?;
    cli.apply(&mut config);
    tracing::info!("Service starting with config: {:?}", config);

    let pool = create_pool(&config.database_url).await?;
    if cli.migrate_only {
        tracing::info!("Migrations applied; exiting");
        return Ok(());
    }

    let mailer = build_mailer(&config.mail)?;
    let metrics = Arc::new(
        AppMetrics::new().map_err(|err| AppError::Config(format!("metrics registry: {}", err)))?,
    );
    let bind_addr = config.bind_addr;
    let state = AppState::new(config, pool, mailer, metrics);

    tokio::spawn(run_pruning(state.clone()));

    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|err| AppError::Config(format!("cannot bind {}: {}", bind_addr, err)))?;
    tracing::info!("Listening on http://{}", bind_addr);

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Config(format!("server error: {}", err)))?;

    tracing::info!("Server stopped cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
    }
    tracing::info!("Shutdown signal received. Stopping server.");
}
