//! Tracing setup for the tray application.
//!
//! Logs go to stderr and to a daily-rolling `lantern.log` in the logs
//! directory, which is what the "Show logs" tray action opens.

use crate::error::Result;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Log file prefix inside the logs directory.
pub const LOG_FILE_NAME: &str = "lantern.log";

/// Install the global tracing subscriber.
///
/// The returned guard flushes the file writer on drop; keep it alive for the
/// lifetime of the process.
///
/// # Errors
///
/// Returns an error if the logs directory cannot be created.
pub fn init(logs_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(logs_dir)?;

    let file_appender = tracing_appender::rolling::daily(logs_dir, LOG_FILE_NAME);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        );

    // A subscriber may already be installed (tests, embedding hosts).
    if let Err(e) = registry.try_init() {
        tracing::debug!("keeping existing tracing subscriber: {e}");
    }

    Ok(guard)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn init_twice_keeps_first_subscriber_and_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");

        let _first = init(&logs).unwrap();
        let _second = init(&logs).unwrap();

        assert!(logs.is_dir());
    }
}
