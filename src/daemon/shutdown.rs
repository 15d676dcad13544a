use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Cancels `cancellation` on ctrl-c, and on unix also on SIGTERM, which is what `dailygrid stop`
/// sends.
///
/// On Windows detached processes can't detect signals sent to them, there the daemon is simply
/// terminated and loses at most the tick in flight.
pub async fn detect_shutdown(cancellation: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received ctrl-c"),
                    _ = terminate.recv() => info!("Received SIGTERM"),
                }
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM {e:?}");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c {e:?}");
            return;
        }
        info!("Received ctrl-c");
    }
    cancellation.cancel();
}
