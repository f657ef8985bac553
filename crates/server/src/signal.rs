use std::future;

/// Resolves with the signal name once SIGINT (Ctrl-C) or SIGTERM is received.
///
/// A handler that cannot be installed never resolves, leaving the other one
/// and the control endpoint as the remaining ways to stop.
pub(crate) async fn wait() -> &'static str {
    let interrupt = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => "SIGINT",
            Err(e) => {
                log::warn!("Failed to install the Ctrl-C handler: {e}");
                future::pending().await
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                "SIGTERM"
            }
            Err(e) => {
                log::warn!("Failed to install the SIGTERM handler: {e}");
                future::pending().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = future::pending::<&'static str>();

    tokio::select! {
        name = interrupt => name,
        name = terminate => name,
    }
}
