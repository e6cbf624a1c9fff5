use std::io::ErrorKind;
use std::path::Path;

use tokio::fs::create_dir;
use tracing::level_filters;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// Set up a stdout logging layer plus a daily rolling file under `<capture dir>/log/`. The
/// returned guard must be held for the lifetime of the process or the file writer stops
/// flushing.
pub async fn configure_logging(capture_dir: &Path) -> WorkerGuard {
    let stdout_log = tracing_subscriber::fmt::layer()
        .with_ansi(false);

    let log_folder = capture_dir.join("log");
    match create_dir(&log_folder).await {
        Ok(_) => {}
        Err(err) => match err.kind() {
            ErrorKind::PermissionDenied => {
                panic!("permission denied creating log folder {log_folder:?}");
            }
            ErrorKind::AlreadyExists => {}
            _ => {}
        },
    }

    let file_appender = tracing_appender::rolling::daily(&log_folder, "netrace-server.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    #[cfg(debug_assertions)]
    let log_level = level_filters::LevelFilter::DEBUG;
    #[cfg(not(debug_assertions))]
    let log_level = level_filters::LevelFilter::INFO;

    let file_log = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(non_blocking)
        .with_filter(log_level);

    tracing_subscriber::registry()
        .with(
            stdout_log
                .with_filter(log_level)
                .and_then(file_log),
        )
        .init();
    guard
}
