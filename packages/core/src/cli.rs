use clap::Parser;

use crate::config::Config;

/// Student portal CLI arguments
#[derive(Debug, Parser)]
#[command(
    name = "student-portal",
    version,
    about = "Student registration, authentication and admin service"
)]
pub struct Cli {
    /// SQLite database URL (overrides DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Address to listen on, e.g. 0.0.0.0:8080 (overrides BIND_ADDR)
    #[arg(long)]
    pub bind: Option<std::net::SocketAddr>,

    /// Apply database migrations and exit
    #[arg(long)]
    pub migrate_only: bool,
}

impl Cli {
    /// Apply command-line overrides on top of the environment config.
    pub fn apply(&self, config: &mut Config) {
        if let Some(url) = &self.database_url {
            config.database_url = url.clone();
        }
        if let Some(bind) = self.bind {
            config.bind_addr = bind;
        }
    }
}
