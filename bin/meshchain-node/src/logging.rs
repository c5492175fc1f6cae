//! Bootstraps the global `tracing` subscriber from [`LoggingConfig`], an
//! `EnvFilter`-driven setup with stdout/file/both sink selection. Returns
//! the [`WorkerGuard`]s that must be kept alive for the life of the
//! process, or the non-blocking writers stop flushing.

use meshchain_config::{LoggingConfig, LoggingSink};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub fn init(config: &LoggingConfig) -> eyre::Result<Vec<WorkerGuard>> {
    let filter = EnvFilter::try_new(&config.directive).unwrap_or_else(|_| EnvFilter::new("info"));
    let mut guards = Vec::new();

    let stdout_layer = match &config.sink {
        LoggingSink::Stdout | LoggingSink::Both { .. } => {
            let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
            guards.push(guard);
            Some(fmt::layer().with_writer(writer))
        }
        LoggingSink::File { .. } => None
    };

    let file_layer = match &config.sink {
        LoggingSink::File { path } | LoggingSink::Both { path } => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| std::path::Path::new("."));
            let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| "meshchain.log".to_string());
            let appender = tracing_appender::rolling::daily(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            guards.push(guard);
            Some(fmt::layer().with_ansi(false).with_writer(writer))
        }
        LoggingSink::Stdout => None
    };

    tracing_subscriber::registry().with(filter).with(stdout_layer).with(file_layer).try_init()?;
    Ok(guards)
}
