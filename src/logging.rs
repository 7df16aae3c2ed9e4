//! Logging setup and component event macros.
//!
//! One fmt layer with a local `HH:MM:SS.mmm` timestamp, filtered from the
//! `[logging]` section. A set `RUST_LOG` replaces the configured filter.
//!
//! ```toml
//! [logging]
//! default = "warn"
//!
//! [logging.modules]
//! "calp::watcher" = "debug"
//! ```
//!
//! Events carry the emitting component as a `component` field, so
//! `[provider] updated: go.yaml` reads as
//! `INFO calp::watcher::handlers::provider: updated: go.yaml component="provider"`.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::ChronoLocal;

use crate::config::LoggingConfig;

const TIMESTAMP_FORMAT: &str = "%H:%M:%S%.3f";

/// Filter directive string for `config`, module overrides in name order.
fn filter_directives(config: &LoggingConfig) -> String {
    let mut modules: Vec<_> = config.modules.iter().collect();
    modules.sort();

    modules
        .into_iter()
        .fold(config.default.clone(), |mut directives, (module, level)| {
            directives.push(',');
            directives.push_str(module);
            directives.push('=');
            directives.push_str(level);
            directives
        })
}

fn env_filter(config: &LoggingConfig) -> EnvFilter {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(filter_directives(config)),
    }
}

/// Install the global subscriber.
///
/// Returns `false` when a subscriber was already installed, in which case
/// the existing one stays in place.
pub fn init_with_config(config: &LoggingConfig) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_timer(ChronoLocal::new(TIMESTAMP_FORMAT.to_string()))
        .with_target(true)
        .try_init()
        .is_ok()
}

#[doc(hidden)]
#[macro_export]
macro_rules! component_event {
    ($level:expr, $component:expr, $event:expr) => {
        tracing::event!($level, component = $component, "{}", $event)
    };
    ($level:expr, $component:expr, $event:expr, $($arg:tt)+) => {
        tracing::event!(
            $level,
            component = $component,
            "{}: {}",
            $event,
            format!($($arg)+)
        )
    };
}

/// Info event for a component.
///
/// ```ignore
/// log_event!("watcher", "started");
/// log_event!("provider", "updated", "{}", path.display());
/// ```
#[macro_export]
macro_rules! log_event {
    ($($arg:tt)+) => {
        $crate::component_event!(tracing::Level::INFO, $($arg)+)
    };
}

/// Debug event for a component.
#[macro_export]
macro_rules! debug_event {
    ($($arg:tt)+) => {
        $crate::component_event!(tracing::Level::DEBUG, $($arg)+)
    };
}

/// Warning event for a component.
#[macro_export]
macro_rules! warn_event {
    ($($arg:tt)+) => {
        $crate::component_event!(tracing::Level::WARN, $($arg)+)
    };
}

/// Error event for a component.
#[macro_export]
macro_rules! error_event {
    ($($arg:tt)+) => {
        $crate::component_event!(tracing::Level::ERROR, $($arg)+)
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_filter_directives() {
        let config = LoggingConfig {
            default: "warn".to_string(),
            modules: HashMap::from([
                ("calp::watcher".to_string(), "debug".to_string()),
                ("calp::provider".to_string(), "info".to_string()),
            ]),
        };

        assert_eq!(
            filter_directives(&config),
            "warn,calp::provider=info,calp::watcher=debug"
        );
    }

    #[test]
    fn test_filter_directives_default_only() {
        assert_eq!(filter_directives(&LoggingConfig::default()), "warn");
    }

    #[test]
    fn test_second_init_keeps_first_subscriber() {
        let config = LoggingConfig::default();

        // Only one test in this binary installs a subscriber
        assert!(init_with_config(&config));
        assert!(!init_with_config(&config));

        crate::log_event!("logging", "installed");
        crate::warn_event!("logging", "level", "{}", config.default);
    }
}
