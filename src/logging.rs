//! # Structured Logging Module
//!
//! Subscriber setup for binaries and tests, plus the explicit per-event log
//! context that handlers and the planner carry instead of mutating shared
//! logger state.

use crate::config::LoggingConfig;
use std::sync::OnceLock;
use tracing::Span;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Install the global subscriber once. `RUST_LOG` wins over the configured level.
pub fn init_structured_logging(config: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

        let layer = if config.json {
            fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_filter(filter)
                .boxed()
        };

        // A subscriber may already be installed by an embedding process or test harness
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized");
        }

        tracing::info!(
            level = %config.level,
            json = config.json,
            "Structured logging initialized"
        );
    });
}

/// Identifies the event and build a log line belongs to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogContext {
    pub event_id: Option<i64>,
    pub message_id: Option<String>,
    pub build: Option<String>,
}

impl LogContext {
    pub fn for_event(event_id: i64, message_id: impl Into<String>) -> Self {
        Self {
            event_id: Some(event_id),
            message_id: Some(message_id.into()),
            build: None,
        }
    }

    /// Same event, narrowed to one artifact
    pub fn with_build(&self, build: impl Into<String>) -> Self {
        Self {
            build: Some(build.into()),
            ..self.clone()
        }
    }

    /// Span carrying the context fields; enter it or `instrument` a future with it
    pub fn span(&self) -> Span {
        tracing::info_span!(
            "rebuild",
            event_id = self.event_id,
            message_id = self.message_id.as_deref(),
            build = self.build.as_deref(),
        )
    }
}
