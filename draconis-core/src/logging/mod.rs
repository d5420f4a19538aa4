//! Structured logging foundation for draconis-rs.
//!
//! The specification treats log formatting and colour handling as an
//! external concern (§1 "Out of scope") — this module only decides *that*
//! the core emits structured [`tracing`] events at the points §7 calls
//! out (a probe degrading to a fallback, a plugin auto-skip, a corrupted
//! cache entry being treated as a miss) and *how verbose* that stream is.
//! Rendering it — colour, JSON vs. plain text, where it's shipped — is for
//! the embedding consumer to decide, same as the reference's own stance
//! that logging is "an opaque sink the core writes to".

pub mod config;

pub use config::{LogConfig, LogFormat, LogLevel};

use std::io::IsTerminal;
use std::sync::atomic::{AtomicU8, Ordering};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Process-wide log-level slot, shared with dynamically loaded plugins
/// through the version-agnostic `SetPluginLogLevel` protocol (§4.7 step
/// 3): a plugin that resolves that symbol is handed a pointer to this
/// atomic so it can read the host's current verbosity without either side
/// depending on the other's log-level enum layout.
static PLUGIN_LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

/// Raw pointer to the process-wide log-level slot, passed to a plugin's
/// `SetPluginLogLevel(levelPtr)` export.
pub fn log_level_ptr() -> *const AtomicU8 {
    &PLUGIN_LOG_LEVEL
}

fn store_log_level(level: LogLevel) {
    PLUGIN_LOG_LEVEL.store(level as u8, Ordering::Relaxed);
}

/// Initialize the logging subsystem. Must be called once at process
/// startup before any `tracing` event is emitted; a second call is a
/// no-op (the underlying subscriber can only be installed once).
pub fn init_logging(config: &LogConfig) {
    store_log_level(config.level);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("draconis_core={}", config.level)));

    let use_ansi = std::io::stderr().is_terminal();

    match config.format {
        LogFormat::Human => {
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_ansi(use_ansi)
                .with_file(config.source_location)
                .with_line_number(config.source_location);
            if config.timestamps {
                let _ = tracing_subscriber::registry().with(filter).with(fmt_layer).try_init();
            } else {
                let _ = tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer.without_time())
                    .try_init();
            }
        }
        LogFormat::Jsonl => {
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .json()
                .with_ansi(false)
                .with_current_span(false)
                .with_file(config.source_location)
                .with_line_number(config.source_location);
            let _ = tracing_subscriber::registry().with(filter).with(fmt_layer).try_init();
        }
    }
}

/// Initialize logging with environment-derived defaults; convenient for
/// tests and for consumers that don't need CLI overrides.
pub fn init_default_logging() {
    init_logging(&LogConfig::from_env(None, None));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_ptr_reflects_configured_level() {
        store_log_level(LogLevel::Debug);
        let ptr = log_level_ptr();
        let loaded = unsafe { (*ptr).load(Ordering::Relaxed) };
        assert_eq!(loaded, LogLevel::Debug as u8);
        store_log_level(LogLevel::Info);
    }
}
