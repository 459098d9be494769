use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Used when `RUST_LOG` is unset. sqlx logs every statement at `info`.
const DEFAULT_DIRECTIVES: &str = "info,sqlx=warn,tower_http=info";

/// Initialize structured logging for the student portal.
///
/// Call once at startup (in main.rs). A second call leaves the first
/// subscriber in place.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter());

    let installed = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init()
        .is_ok();

    if installed {
        info!(version = env!("CARGO_PKG_VERSION"), "Logging initialized");
    }
}

fn default_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_DIRECTIVES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_quiets_sqlx() {
        let rendered = default_filter().to_string();
        assert!(rendered.contains("sqlx=warn"));
        assert!(rendered.contains("tower_http=info"));
    }

    #[test]
    fn repeated_init_is_harmless() {
        init_logging();
        init_logging();
    }
}
