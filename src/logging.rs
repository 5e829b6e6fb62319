use crate::errors::CrawlResult;
use chrono::Local;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// `log - 10_19_14_03_59.log`
pub fn log_file_name(now: chrono::DateTime<Local>) -> String {
    now.format("log - %m_%d_%H_%M_%S.log").to_string()
}

/// Install the process-wide subscriber: console on stderr plus a
/// timestamped file in `log_dir`. Keep the guard alive until exit or the
/// file writer drops buffered lines.
pub fn init_logging(log_dir: &Path) -> CrawlResult<(WorkerGuard, PathBuf)> {
    std::fs::create_dir_all(log_dir)?;

    let file_name = log_file_name(Local::now());
    let file_appender = tracing_appender::rolling::never(log_dir, &file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn,hyper=warn,html5ever=error"));

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok((guard, log_dir.join(file_name)))
}
