//! Loopback-only control endpoint.

use axum::{Router, extract::State, http::StatusCode, routing::any};

use crate::shutdown::{ShutdownSignal, ShutdownTrigger};

/// Path accepting shutdown requests on the control listener, for any method.
pub const QUIT_PATH: &str = "/quitquitquit";

pub(crate) fn router(signal: ShutdownSignal) -> Router {
    Router::new().route(QUIT_PATH, any(quit)).with_state(signal)
}

/// Every call answers the same, only the first one starts the shutdown.
async fn quit(State(signal): State<ShutdownSignal>) -> (StatusCode, &'static str) {
    log::info!("Received shutdown request on {QUIT_PATH}");

    signal.fire(ShutdownTrigger::ControlRequest);

    (StatusCode::OK, "Initiating shutdown...")
}
