use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

/// Cancel `token` when SIGTERM or SIGINT is received.
///
/// Every node loop observes a child of this token and exits between
/// iterations. Must be called from within a Tokio runtime.
pub fn install_shutdown_handler(token: CancellationToken) -> std::io::Result<()> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, stopping cluster");
            }
            _ = sigint.recv() => {
                tracing::info!("Received SIGINT, stopping cluster");
            }
            _ = token.cancelled() => return,
        }

        token.cancel();
    });

    Ok(())
}
