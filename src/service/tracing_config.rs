use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use super::{AppError, AppResult};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Console subscriber for binaries and local runs.
pub fn setup_local_tracing() -> AppResult<()> {
    let timer = ChronoLocal::new(TIME_FORMAT.to_string());
    let subscriber = tracing_subscriber::fmt()
        .with_timer(timer)
        .with_env_filter(env_filter())
        .with_target(true)
        .with_thread_names(true)
        .with_line_number(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// File subscriber with a daily-rolling appender.
///
/// The returned guard must be held for the lifetime of the process; dropping
/// it stops the background log writer.
pub fn setup_tracing() -> AppResult<WorkerGuard> {
    let file_appender = tracing_appender::rolling::daily("logs", "netframe.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let timer = ChronoLocal::new(TIME_FORMAT.to_string());
    tracing_subscriber::registry()
        .with(env_filter())
        .with(
            tracing_subscriber::fmt::layer()
                .with_timer(timer)
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_line_number(true),
        )
        .try_init()
        .map_err(|e| AppError::IllegalStateError(format!("tracing init failed: {}", e)))?;
    Ok(guard)
}
