//! Cancellation of a tool run by Ctrl+C or SIGTERM.
//!
//! [`run_until_interrupted`] races the row loop against the signals. The
//! loop only borrows its resources, so when it is dropped the caller still
//! owns them and releases them on the same path as a normal finish.

use std::future::Future;
use tracing::{info, warn};

use crate::error::{ToolError, ToolResult};

/// Resolves when the user asks the process to stop.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C signal, stopping"),
            Err(e) => {
                warn!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
                info!("Received terminate signal, stopping");
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Run `work` unless a shutdown signal arrives first.
pub async fn run_until_interrupted<F, T>(work: F) -> ToolResult<T>
where
    F: Future<Output = ToolResult<T>>,
{
    interruptible(work, shutdown_signal()).await
}

/// Run `work` unless `stop` resolves first.
pub async fn interruptible<F, S, T>(work: F, stop: S) -> ToolResult<T>
where
    F: Future<Output = ToolResult<T>>,
    S: Future<Output = ()>,
{
    tokio::select! {
        result = work => result,
        _ = stop => Err(ToolError::Interrupted),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_work_finishes_first() {
        let result = interruptible(async { Ok(7) }, std::future::pending()).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_stop_drops_work_and_releases_borrow() {
        let mut rows_done = 0;
        let result: ToolResult<()> = interruptible(
            async {
                rows_done += 1;
                std::future::pending::<()>().await;
                Ok(())
            },
            async {},
        )
        .await;

        assert!(matches!(result, Err(ToolError::Interrupted)));
        // the borrow ended with the dropped future
        rows_done += 1;
        assert!(rows_done >= 1);
    }
}
