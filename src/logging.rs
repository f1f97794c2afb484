//! Subscriber setup for the command line tool.

use crate::config::Settings;
use std::str::FromStr;
use tracing_subscriber::{filter::LevelFilter, fmt};

/// Resolve the log level of `settings`. `debug = true` wins over the
/// configured level; an unknown level falls back to `info`.
pub fn level_for(settings: &Settings) -> LevelFilter {
    if settings.debug {
        return LevelFilter::DEBUG;
    }
    LevelFilter::from_str(settings.logging.level.trim()).unwrap_or(LevelFilter::INFO)
}

/// Install a stderr subscriber. Stdout stays free for exported documents.
pub fn init(level: LevelFilter) {
    let subscriber = fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::warn!("Tracing subscriber already set; skipping re-initialization.");
    }
}
