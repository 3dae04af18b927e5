//! Centralised tracing initialisation for testgate binaries.
//!
//! Call [`init_tracing`] once at program start. The filter comes from
//! `TESTGATE_LOG`, then `RUST_LOG`, then the level passed by the caller.
//! Setting `TESTGATE_LOG_FORMAT=json` has the same effect as the `json` flag.
//!
//! Subsequent calls are silently ignored (the global subscriber can only be
//! set once per process).

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter directives for testgate logging.
pub const LOG_ENV: &str = "TESTGATE_LOG";

/// `json` selects newline-delimited JSON output.
pub const LOG_FORMAT_ENV: &str = "TESTGATE_LOG_FORMAT";

/// Pick the filter directive: `TESTGATE_LOG` wins over `RUST_LOG`, and both
/// win over `level`. Blank values are ignored.
fn filter_directive(
    testgate_log: Option<String>,
    rust_log: Option<String>,
    level: Level,
) -> String {
    [testgate_log, rust_log]
        .into_iter()
        .flatten()
        .find(|d| !d.trim().is_empty())
        .unwrap_or_else(|| level.as_str().to_string())
}

fn wants_json(flag: bool, format: Option<String>) -> bool {
    flag || format.is_some_and(|f| f.eq_ignore_ascii_case("json"))
}

/// Initialise the global tracing subscriber.
///
/// Logs go to stderr so stdout stays free for the report summary.
pub fn init_tracing(json: bool, level: Level) {
    let directive = filter_directive(
        std::env::var(LOG_ENV).ok(),
        std::env::var("RUST_LOG").ok(),
        level,
    );
    let env_filter =
        EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    if wants_json(json, std::env::var(LOG_FORMAT_ENV).ok()) {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer.json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer)
            .try_init()
            .ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_testgate_log_wins() {
        let directive = filter_directive(
            Some("testgate_ci=debug".to_string()),
            Some("warn".to_string()),
            Level::INFO,
        );
        assert_eq!(directive, "testgate_ci=debug");
    }

    #[test]
    fn test_falls_back_to_level() {
        assert_eq!(filter_directive(None, None, Level::DEBUG), "DEBUG");
        assert_eq!(
            filter_directive(Some("  ".to_string()), Some("warn".to_string()), Level::INFO),
            "warn"
        );
    }

    #[test]
    fn test_json_from_env() {
        assert!(wants_json(true, None));
        assert!(wants_json(false, Some("JSON".to_string())));
        assert!(!wants_json(false, Some("text".to_string())));
    }
}
