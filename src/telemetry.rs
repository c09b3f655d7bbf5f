//! Logging setup
//!
//! Logs always go to stdout. With `--log-file` they are also written to a
//! daily-rotated file through a non-blocking writer; the returned guard must
//! be held for the life of the process or buffered lines are lost.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::{Directive, LevelFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::Config;
use crate::error::{Error, Result};

/// Build the filter: `RUST_LOG` when set, otherwise the configured level for this crate
pub fn env_filter(level: LevelFilter) -> Result<EnvFilter> {
    let from_env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    build_filter(from_env.as_deref(), level)
}

fn build_filter(from_env: Option<&str>, level: LevelFilter) -> Result<EnvFilter> {
    let builder = EnvFilter::builder().with_default_directive(LevelFilter::WARN.into());
    match from_env.filter(|d| !d.trim().is_empty()) {
        Some(directives) => Ok(builder.parse_lossy(directives)),
        None => Ok(builder
            .parse_lossy("")
            .add_directive(directive(&format!("namespace_guard={}", level))?)
            .add_directive(directive("kube=info")?)),
    }
}

fn directive(d: &str) -> Result<Directive> {
    d.parse()
        .map_err(|e| Error::InvalidConfig(format!("invalid log directive '{}': {}", d, e)))
}

/// Install the global subscriber
pub fn init_logging(config: &Config) -> Result<Option<WorkerGuard>> {
    let filter = env_filter(config.level_filter()?)?;

    let (file_layer, guard) = match &config.log_file {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(file_appender(path)?);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::InvalidConfig(format!("failed to install logger: {}", e)))?;

    Ok(guard)
}

fn file_appender(path: &Path) -> Result<RollingFileAppender> {
    let file_name = path.file_name().ok_or_else(|| {
        Error::InvalidConfig(format!("log file '{}' has no file name", path.display()))
    })?;
    let directory = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(file_name.to_string_lossy())
        .build(directory)
        .map_err(|e| Error::InvalidConfig(format!("cannot open log file '{}': {}", path.display(), e)))
}
