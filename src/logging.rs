//! Logging setup
//!
//! The library only emits `tracing` events. Binaries call [`init`] once
//! to install a subscriber; later calls do nothing.

use std::io;

use once_cell::sync::OnceCell;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

static LOGGER_INITIALIZED: OnceCell<()> = OnceCell::new();

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default level for this crate's events
    pub level: Level,
    /// JSON lines instead of human-readable output
    pub json_format: bool,
    /// Log span enter/close events
    pub show_spans: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::WARN,
            json_format: false,
            show_spans: false,
        }
    }
}

impl LogConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // DYNFFI_LOG_LEVEL: trace, debug, info, warn, error
        if let Ok(level) = std::env::var("DYNFFI_LOG_LEVEL") {
            config.level = parse_level(&level).unwrap_or(config.level);
        }
        config.json_format = std::env::var("DYNFFI_LOG_JSON").is_ok();
        config.show_spans = std::env::var("DYNFFI_LOG_SPANS").is_ok();

        config
    }

    /// Same config one level more verbose per step
    pub fn verbose(mut self, steps: u8) -> Self {
        for _ in 0..steps {
            self.level = match self.level {
                Level::ERROR => Level::WARN,
                Level::WARN => Level::INFO,
                Level::INFO => Level::DEBUG,
                _ => Level::TRACE,
            };
        }
        self
    }
}

/// Parse a level name, case-insensitively
pub fn parse_level(name: &str) -> Option<Level> {
    match name.to_ascii_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Initialize logging from the environment
pub fn init() {
    init_with_config(LogConfig::from_env());
}

/// Initialize logging with custom configuration.
///
/// `RUST_LOG`, when set, overrides `config.level`.
pub fn init_with_config(config: LogConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("dynffi={}", config.level.as_str().to_lowercase()))
        });

        let span_events = if config.show_spans {
            FmtSpan::ENTER | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        let json = config.json_format.then(|| {
            fmt::layer()
                .json()
                .with_writer(io::stderr)
                .with_span_events(span_events.clone())
        });
        let plain = (!config.json_format).then(|| {
            fmt::layer()
                .with_writer(io::stderr)
                .with_span_events(span_events)
                .with_target(true)
                .with_thread_ids(cfg!(debug_assertions))
        });

        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(json)
            .with(plain)
            .try_init();
    });
}

/// Whether [`init`] or [`init_with_config`] has already run
pub fn is_initialized() -> bool {
    LOGGER_INITIALIZED.get().is_some()
}
