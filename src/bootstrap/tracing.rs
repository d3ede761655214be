//! Setup for the application tracing.
//!
//! It redirects the tracing spans and events to the standard output with the
//! verbosity level defined in the configuration:
//!
//! - `Off` (no subscriber is installed)
//! - `Error`
//! - `Warn`
//! - `Info`
//! - `Debug`
//! - `Trace`
use std::sync::Once;

use torrust_udp_tracker_configuration::core::LogLevel;
use torrust_udp_tracker_configuration::Configuration;
use tracing::debug;
use tracing::level_filters::LevelFilter;

static INIT: Once = Once::new();

/// It redirects the tracing output to stdout with the level defined in the
/// configuration.
pub fn setup(cfg: &Configuration) {
    let filter = level_filter(cfg.core.log_level);

    if filter == LevelFilter::OFF {
        return;
    }

    INIT.call_once(|| {
        stdout_init(filter);
    });
}

fn level_filter(log_level: LogLevel) -> LevelFilter {
    match log_level {
        LogLevel::Off => LevelFilter::OFF,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    }
}

fn stdout_init(filter: LevelFilter) {
    tracing_subscriber::fmt().with_max_level(filter).init();

    debug!("tracing initialized.");
}
