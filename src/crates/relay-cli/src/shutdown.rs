//! Signal handling

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Cancel `token` on SIGINT or SIGTERM (Ctrl+C elsewhere).
pub fn install_signal_handlers(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let (mut sigint, mut sigterm) =
                match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
                    (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
                    (Err(e), _) | (_, Err(e)) => {
                        warn!(error = %e, "Failed to install signal handlers");
                        return;
                    }
                };

            tokio::select! {
                _ = sigint.recv() => warn!("Received SIGINT, cancelling running goals"),
                _ = sigterm.recv() => warn!("Received SIGTERM, cancelling running goals"),
                _ = token.cancelled() => return,
            }
        }

        #[cfg(not(unix))]
        {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    if let Err(e) = result {
                        warn!(error = %e, "Failed to install Ctrl+C handler");
                        return;
                    }
                    warn!("Received Ctrl+C, cancelling running goals");
                }
                _ = token.cancelled() => return,
            }
        }

        token.cancel();
    })
}
