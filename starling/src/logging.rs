//! # Runtime Logging
//!
//! Structured logging for Starling, built on the `tracing` ecosystem. The
//! runtime itself only emits events; a host picks how they are rendered by
//! calling one of the `init*` functions once at startup.
//!
//! ## Initialization
//!
//! ```rust,no_run
//! use starling::logging;
//!
//! // INFO level, human-readable console output
//! logging::init_default();
//!
//! // Or a custom configuration
//! logging::init(logging::LogConfig {
//!     level: tracing::Level::DEBUG,
//!     target_filters: Some("starling::timer=trace".to_string()),
//!     ..Default::default()
//! });
//! ```
//!
//! ## Event Macros
//!
//! Runtime events carry the actor handle in its textual `:XXXXXXXX` form:
//!
//! ```rust,no_run
//! use starling::{actor_span, log_lifecycle};
//! use starling_api::Handle;
//!
//! let handle = Handle::new(1);
//! let span = actor_span!(handle, "echo");
//! let _guard = span.enter();
//! log_lifecycle!(handle, "echo", "launched");
//! ```

use std::io;
use std::sync::Once;

use tracing::{Level, Subscriber};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Configuration for the logging subscriber.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum level to display
    pub level: Level,
    /// Emit one JSON object per event instead of text
    pub json_format: bool,
    /// Include source file and line
    pub show_file_line: bool,
    /// Include thread name and id. Worker threads are named after
    /// `RuntimeConfig::thread_name_prefix`.
    pub show_thread_info: bool,
    /// Include timestamps
    pub show_time: bool,
    /// Extra filter directives (`target=level,target2=level2`)
    pub target_filters: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            show_file_line: true,
            show_thread_info: true,
            show_time: true,
            target_filters: None,
        }
    }
}

static INIT: Once = Once::new();

fn env_filter(config: &LogConfig) -> EnvFilter {
    let mut filter = EnvFilter::from_default_env().add_directive(config.level.into());
    if let Some(filters) = &config.target_filters {
        for directive in filters
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .filter_map(|f| f.parse().ok())
        {
            filter = filter.add_directive(directive);
        }
    }
    filter
}

/// Installs the global subscriber. Only the first call of any `init*`
/// function takes effect.
pub fn init(config: LogConfig) {
    INIT.call_once(|| {
        let registry = tracing_subscriber::registry().with(env_filter(&config));

        let subscriber: Box<dyn Subscriber + Send + Sync> = if config.json_format {
            Box::new(
                registry.with(
                    fmt::layer()
                        .json()
                        .flatten_event(true)
                        .with_file(config.show_file_line)
                        .with_line_number(config.show_file_line)
                        .with_thread_names(config.show_thread_info)
                        .with_thread_ids(config.show_thread_info),
                ),
            )
        } else {
            let layer = fmt::layer()
                .with_ansi(atty::is(atty::Stream::Stdout))
                .with_file(config.show_file_line)
                .with_line_number(config.show_file_line)
                .with_thread_names(config.show_thread_info)
                .with_thread_ids(config.show_thread_info);
            if config.show_time {
                Box::new(registry.with(layer))
            } else {
                Box::new(registry.with(layer.without_time()))
            }
        };

        set_global_subscriber(subscriber);
    });
}

fn set_global_subscriber<S>(subscriber: S)
where
    S: Subscriber + Send + Sync + 'static,
{
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Error setting global tracing subscriber: {}", err);
    }
}

/// Opens `path` for appending, creating it if needed.
pub fn file_writer(path: &str) -> io::Result<Box<dyn io::Write + Send + Sync + 'static>> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    Ok(Box::new(file))
}

/// Installs a subscriber writing to the console and to `log_file`.
///
/// The file is opened once up front so that an unwritable path is reported
/// to the caller instead of silently falling back.
///
/// # Errors
/// Returns the I/O error if the file cannot be opened or created.
pub fn init_with_file(config: LogConfig, log_file: &str) -> io::Result<()> {
    file_writer(log_file)?;

    INIT.call_once(|| {
        let console_layer = fmt::layer()
            .with_ansi(atty::is(atty::Stream::Stdout))
            .with_file(config.show_file_line)
            .with_line_number(config.show_file_line)
            .with_thread_names(config.show_thread_info)
            .with_thread_ids(config.show_thread_info);

        let path = log_file.to_string();
        let file_layer = fmt::layer()
            .with_ansi(false)
            .with_writer(move || -> Box<dyn io::Write + Send + Sync> {
                file_writer(&path).unwrap_or_else(|_| Box::new(io::stderr()))
            })
            .with_file(true)
            .with_line_number(true)
            .with_thread_names(true)
            .with_thread_ids(true);

        let subscriber = tracing_subscriber::registry()
            .with(env_filter(&config))
            .with(console_layer)
            .with(file_layer);

        set_global_subscriber(subscriber);
    });

    Ok(())
}

/// INFO level, console output.
pub fn init_default() {
    init(LogConfig::default());
}

/// DEBUG everywhere, TRACE for the timer and scheduler.
pub fn init_development() {
    init(LogConfig {
        level: Level::DEBUG,
        target_filters: Some("starling::timer=trace,starling::scheduler=trace".to_string()),
        ..Default::default()
    });
}

/// JSON output at INFO, without source locations.
pub fn init_production() {
    init(LogConfig {
        level: Level::INFO,
        json_format: true,
        show_file_line: false,
        show_thread_info: true,
        show_time: true,
        target_filters: None,
    });
}

/// Warnings and errors only, compact, for test binaries.
pub fn init_test() {
    init(LogConfig {
        level: Level::WARN,
        json_format: false,
        show_file_line: true,
        show_thread_info: false,
        show_time: false,
        target_filters: None,
    });
}

/// Span wrapping work done on behalf of one actor.
///
/// ```rust,no_run
/// use starling::actor_span;
/// use starling_api::Handle;
///
/// let span = actor_span!(Handle::new(3), "gate", session = 7);
/// ```
#[macro_export]
macro_rules! actor_span {
    ($handle:expr, $module:expr) => {
        tracing::info_span!("actor", handle = %$handle, module = $module)
    };
    ($handle:expr, $module:expr, $($fields:tt)*) => {
        tracing::info_span!("actor", handle = %$handle, module = $module, $($fields)*)
    };
}

/// Actor lifecycle events: launched, init failed, retired, destroyed.
#[macro_export]
macro_rules! log_lifecycle {
    ($handle:expr, $module:expr, $event:expr) => {
        tracing::info!(handle = %$handle, module = $module, event = $event)
    };
    ($handle:expr, $module:expr, $event:expr, $($fields:tt)*) => {
        tracing::info!(handle = %$handle, module = $module, event = $event, $($fields)*)
    };
}

/// A message that could not be delivered.
#[macro_export]
macro_rules! log_dead_letter {
    ($destination:expr, $reason:expr) => {
        tracing::warn!(destination = %$destination, reason = %$reason, "dead letter")
    };
    ($destination:expr, $reason:expr, $($fields:tt)*) => {
        tracing::warn!(destination = %$destination, reason = %$reason, $($fields)*, "dead letter")
    };
}

/// Scheduler and worker events.
#[macro_export]
macro_rules! log_scheduler {
    ($component:expr, $event:expr) => {
        tracing::debug!(component = $component, event = $event)
    };
    ($component:expr, $event:expr, $($fields:tt)*) => {
        tracing::debug!(component = $component, event = $event, $($fields)*)
    };
}

/// The current dispatcher, for installing on threads that should share the
/// caller's subscriber.
#[inline]
pub fn current_subscriber() -> tracing::Dispatch {
    tracing::dispatcher::get_default(|d| d.clone())
}

pub use tracing::{debug, error, info, trace, warn};
