use std::{fmt, io};

use tokio::sync::watch;

use crate::shutdown::ShutdownTrigger;

/// Phases the gateway moves through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LifecycleState {
    /// Listeners are bound but not yet serving.
    Starting,
    /// Both listeners are serving.
    Running,
    /// Shutdown has fired and in-flight requests are being drained.
    Draining,
    /// Both listeners have stopped.
    Stopped,
}

/// The two listeners owned by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerKind {
    /// The OpenAI-compatible API.
    Public,
    /// The loopback-only shutdown endpoint.
    Control,
}

impl fmt::Display for ListenerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerKind::Public => f.write_str("public"),
            ListenerKind::Control => f.write_str("control"),
        }
    }
}

/// Decides whether a listener stopping before shutdown brings the gateway down.
///
/// Only the public listener does. A control listener failure is logged and the
/// gateway keeps serving without it.
pub(crate) fn on_listener_exit(kind: ListenerKind, result: &io::Result<()>) -> Option<ShutdownTrigger> {
    let reason = match result {
        Ok(()) => "listener stopped unexpectedly".to_string(),
        Err(e) => e.to_string(),
    };

    match kind {
        ListenerKind::Public => {
            log::error!("Public listener failed: {reason}");
            Some(ShutdownTrigger::PublicListenerFailed(reason))
        }
        ListenerKind::Control => {
            log::error!("Control listener failed, shutdown is only possible through signals: {reason}");
            None
        }
    }
}

/// How a listener finished draining.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    /// All in-flight requests completed before the deadline.
    Clean,
    /// The listener stopped with an error.
    Failed(String),
    /// The deadline passed and the remaining connections were cut off.
    Forced,
}

/// Summary of a completed shutdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    /// The trigger that started the shutdown.
    pub trigger: ShutdownTrigger,
    /// How the public listener drained.
    pub public: DrainOutcome,
    /// How the control listener drained.
    pub control: DrainOutcome,
}

impl ShutdownReport {
    /// Whether the public listener finished every request it had accepted.
    pub fn is_clean(&self) -> bool {
        self.public == DrainOutcome::Clean
    }
}

/// Publishes the current [`LifecycleState`] to any number of observers.
pub(crate) struct Lifecycle {
    state: watch::Sender<LifecycleState>,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (state, _) = watch::channel(LifecycleState::Starting);
        Self { state }
    }

    /// Moves to `next`. States never go backwards.
    pub fn advance(&self, next: LifecycleState) -> bool {
        self.state.send_if_modified(|current| {
            if next > *current {
                log::debug!("Gateway lifecycle {current:?} -> {next:?}");
                *current = next;
                true
            } else {
                false
            }
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }
}
