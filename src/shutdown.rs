use std::future::Future;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Await a future or a cancellation signal.
///
/// - Returns `Ok(output)` when the future completes first
/// - Returns `Err(())` once `cancel` is triggered
pub async fn select_or_shutdown<F: Future>(
    future: F,
    cancel: &CancellationToken,
) -> Result<F::Output, ()> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(()),
        output = future => Ok(output),
    }
}

/// Returns a token that is cancelled on Ctrl-C.
pub fn cancel_on_interrupt() -> CancellationToken {
    let cancel = CancellationToken::new();
    tokio::spawn({
        let interrupt_handle = cancel.clone();
        async move {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
                return;
            }
            info!("Interrupt received, stopping");
            interrupt_handle.cancel();
        }
    });
    cancel
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn future_wins_when_not_cancelled() {
        let cancel = CancellationToken::new();
        let out = select_or_shutdown(async { 7 }, &cancel).await;
        assert_eq!(out, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_pending_future() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let out = select_or_shutdown(tokio::time::sleep(Duration::from_secs(60)), &cancel).await;
        assert_eq!(out, Err(()));
    }
}
