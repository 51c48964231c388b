//! Tracing setup driven by the `host.logger` configuration section.

use std::sync::Arc;

use pmoconfig::Config;
use tracing::Level;
use tracing_subscriber::{
    Registry,
    filter::LevelFilter,
    layer::SubscriberExt,
    reload,
    util::SubscriberInitExt,
};

use crate::errors::{PlayerError, Result};

/// Handle on the installed subscriber, used to change the level at runtime.
#[derive(Clone)]
pub struct LogHandle {
    reload_handle: reload::Handle<LevelFilter, Registry>,
    config: Arc<Config>,
}

impl LogHandle {
    /// Changes the minimum level and records it in the configuration.
    pub fn set_level(&self, level: Level) -> Result<()> {
        self.reload_handle
            .reload(LevelFilter::from_level(level))
            .map_err(|e| PlayerError::Logging(e.to_string()))?;
        self.config.set_log_min_level(level_to_string(level).to_string())?;
        Ok(())
    }

    pub fn level(&self) -> Option<Level> {
        self.reload_handle
            .with_current(|filter| filter.into_level())
            .ok()
            .flatten()
    }
}

/// Installs the global subscriber from the global configuration.
pub fn init_logging() -> Result<LogHandle> {
    init_logging_with(pmoconfig::get_config())
}

pub fn init_logging_with(config: Arc<Config>) -> Result<LogHandle> {
    let log_level = config
        .get_log_min_level()
        .ok()
        .and_then(|l| string_to_level(&l))
        .map(LevelFilter::from_level)
        .unwrap_or(LevelFilter::INFO);

    let (filter, reload_handle) = reload::Layer::new(log_level);
    let subscriber = Registry::default().with(filter);

    let enable_console = config.get_log_enable_console().unwrap_or(true);

    let installed = if enable_console {
        subscriber
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_ansi(true),
            )
            .try_init()
    } else {
        subscriber.try_init()
    };
    installed.map_err(|e| PlayerError::Logging(e.to_string()))?;

    Ok(LogHandle {
        reload_handle,
        config,
    })
}

fn string_to_level(s: &str) -> Option<Level> {
    match s.trim().to_uppercase().as_str() {
        "ERROR" => Some(Level::ERROR),
        "WARN" | "WARNING" => Some(Level::WARN),
        "INFO" => Some(Level::INFO),
        "DEBUG" => Some(Level::DEBUG),
        "TRACE" => Some(Level::TRACE),
        _ => None,
    }
}

fn level_to_string(level: Level) -> &'static str {
    match level {
        Level::ERROR => "ERROR",
        Level::WARN => "WARN",
        Level::INFO => "INFO",
        Level::DEBUG => "DEBUG",
        Level::TRACE => "TRACE",
    }
}
