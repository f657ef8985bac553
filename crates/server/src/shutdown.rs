//! Single-fire shutdown signal shared by every shutdown trigger.

use std::{
    fmt,
    sync::{Arc, OnceLock},
};

use tokio_util::sync::CancellationToken;

/// What caused the gateway to start shutting down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownTrigger {
    /// The process received a termination signal.
    OsSignal(&'static str),
    /// A shutdown was requested through the control listener.
    ControlRequest,
    /// The public listener stopped accepting connections on its own.
    PublicListenerFailed(String),
}

impl fmt::Display for ShutdownTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownTrigger::OsSignal(name) => write!(f, "OS signal {name}"),
            ShutdownTrigger::ControlRequest => write!(f, "control request"),
            ShutdownTrigger::PublicListenerFailed(reason) => write!(f, "public listener failure ({reason})"),
        }
    }
}

/// Fires at most once, no matter how many triggers race for it.
///
/// The first trigger is recorded and every waiter is released. Later calls are
/// no-ops that report they lost.
#[derive(Clone, Debug, Default)]
pub struct ShutdownSignal {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    trigger: OnceLock<ShutdownTrigger>,
    token: CancellationToken,
}

impl ShutdownSignal {
    /// Creates a signal that has not fired yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the signal. Returns `true` only for the call that actually fired it.
    pub fn fire(&self, trigger: ShutdownTrigger) -> bool {
        match self.inner.trigger.set(trigger) {
            Ok(()) => {
                if let Some(trigger) = self.inner.trigger.get() {
                    log::info!("Shutdown triggered by {trigger}");
                }

                self.inner.token.cancel();
                true
            }
            Err(ignored) => {
                log::debug!("Ignoring {ignored}, shutdown is already in progress");
                false
            }
        }
    }

    /// The trigger that fired the signal, if any.
    pub fn trigger(&self) -> Option<&ShutdownTrigger> {
        self.inner.trigger.get()
    }

    /// Whether the signal has fired.
    pub fn is_fired(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Waits for the signal to fire and returns the winning trigger.
    pub async fn fired(&self) -> ShutdownTrigger {
        loop {
            // The trigger is recorded before the token is cancelled.
            if let Some(trigger) = self.inner.trigger.get() {
                return trigger.clone();
            }

            self.inner.token.cancelled().await;
        }
    }
}
