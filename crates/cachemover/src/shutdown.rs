//! Signal and deadline driven cancellation

use std::io;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Cancel `token` when SIGTERM or SIGINT (Ctrl+C or Ctrl+Break on Windows) arrives
pub fn install_signal_handlers(token: CancellationToken) {
    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(signal) => {
                info!(signal, "Received signal, cancelling");
                token.cancel();
            }
            Err(e) => warn!(error = %e, "Failed to install signal handlers"),
        }
    });
}

/// Cancel `token` once `timeout` elapses, unless it is cancelled first
pub fn arm_deadline(token: CancellationToken, timeout: Duration) {
    tokio::spawn(async move {
        tokio::select! {
            () = token.cancelled() => {}
            () = tokio::time::sleep(timeout) => {
                warn!(timeout_secs = timeout.as_secs(), "Deadline reached, cancelling");
                token.cancel();
            }
        }
    });
}

#[cfg(unix)]
async fn wait_for_signal() -> io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => Ok("SIGTERM"),
        _ = sigint.recv() => Ok("SIGINT"),
    }
}

#[cfg(windows)]
async fn wait_for_signal() -> io::Result<&'static str> {
    use tokio::signal::windows;

    let mut ctrl_c = windows::ctrl_c()?;
    let mut ctrl_break = windows::ctrl_break()?;

    tokio::select! {
        _ = ctrl_c.recv() => Ok("Ctrl+C"),
        _ = ctrl_break.recv() => Ok("Ctrl+Break"),
    }
}

#[cfg(not(any(unix, windows)))]
async fn wait_for_signal() -> io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("Ctrl+C")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deadline_cancels_token() {
        let token = CancellationToken::new();
        arm_deadline(token.clone(), Duration::from_millis(10));

        tokio::time::timeout(Duration::from_secs(5), token.cancelled())
            .await
            .unwrap();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_deadline_stands_down_after_cancel() {
        let token = CancellationToken::new();
        arm_deadline(token.clone(), Duration::from_secs(3600));
        token.cancel();

        // The deadline task exits instead of sleeping for an hour
        tokio::task::yield_now().await;
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_signal_handlers_leave_token_alone() {
        let token = CancellationToken::new();
        install_signal_handlers(token.clone());
        tokio::task::yield_now().await;
        assert!(!token.is_cancelled());
    }
}
