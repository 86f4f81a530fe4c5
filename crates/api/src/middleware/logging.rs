//! Subscriber setup.

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::LoggingConfig;

/// Dependency targets that are chatty at `debug`.
const QUIET_TARGETS: [&str; 3] = ["sqlx=warn", "hyper=info", "tower_http=info"];

/// Filter directives for a configured level. `RUST_LOG`, when set, replaces them.
pub fn filter_directives(level: &str) -> String {
    let mut directives = vec![level.trim().to_string()];
    directives.extend(QUIET_TARGETS.iter().map(|d| d.to_string()));
    directives.join(",")
}

/// Installs the global subscriber; `logging.format` picks `json` or `pretty`.
pub fn init_logging(config: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(&config.level)));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    if config.format == "json" {
        subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .init();
    } else {
        subscriber
            .with(fmt::layer().pretty().with_span_events(FmtSpan::CLOSE))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directives() {
        assert_eq!(
            filter_directives(" debug "),
            "debug,sqlx=warn,hyper=info,tower_http=info"
        );
    }

    #[test]
    fn test_filter_directives_parse() {
        assert!(EnvFilter::try_new(filter_directives("info")).is_ok());
    }
}
