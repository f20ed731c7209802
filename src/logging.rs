//! Logging setup shared by the cluster driver and observer binaries.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is unset
    pub level: LevelFilter,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            json: false,
        }
    }
}

/// Parse a level name such as `info` or `debug`.
pub fn parse_level(level: &str) -> Option<LevelFilter> {
    level.parse::<LevelFilter>().ok()
}

/// Install the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::builder()
        .with_default_directive(config.level.into())
        .from_env_lossy();

    let registry = tracing_subscriber::registry().with(filter);
    let res = if config.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .try_init()
    };

    if res.is_err() {
        tracing::debug!("Global subscriber already installed");
    }
}
