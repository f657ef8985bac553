//! Gateway server library.
//!
//! Owns the two listeners and their shutdown. The public listener serves the
//! OpenAI-compatible API, the control listener accepts shutdown requests on
//! loopback only. Used by the binary and by the integration tests.

#![deny(missing_docs)]

mod control;
mod health;
mod lifecycle;
mod listener;
mod shutdown;
mod signal;

use std::{io, net::SocketAddr, time::Duration};

use anyhow::anyhow;
use axum::{Router, middleware};
use config::Config;
use tokio::{net::TcpListener, sync::watch, task::JoinHandle, time::Instant};
use tokio_util::sync::CancellationToken;

pub use control::QUIT_PATH;
pub use lifecycle::{DrainOutcome, LifecycleState, ListenerKind, ShutdownReport};
pub use shutdown::{ShutdownSignal, ShutdownTrigger};

use lifecycle::Lifecycle;

/// A gateway with both listeners bound, ready to [`run`](Gateway::run).
pub struct Gateway {
    config: Config,
    public: TcpListener,
    control: TcpListener,
    public_address: SocketAddr,
    control_address: SocketAddr,
    public_app: Router,
    control_app: Router,
    signal: ShutdownSignal,
    lifecycle: Lifecycle,
    force: CancellationToken,
}

impl Gateway {
    /// Validates the configuration, builds both routers and binds both listeners.
    pub async fn bind(config: Config) -> anyhow::Result<Self> {
        config.validate()?;

        let signal = ShutdownSignal::new();
        let force = CancellationToken::new();

        let public_app = llm::router(&config)?
            .merge(health::router(&config)?)
            .layer(middleware::from_fn_with_state(force.clone(), listener::cut_off));

        let control_app =
            control::router(signal.clone()).layer(middleware::from_fn_with_state(force.clone(), listener::cut_off));

        let public = bind_listener(config.server.public_address()).await?;
        let control = bind_listener(config.server.control_address()).await?;

        let public_address = public.local_addr()?;
        let control_address = control.local_addr()?;

        log::info!(
            "Gateway listening on http://{public_address}, forwarding to {}",
            config.upstream.base_url().unwrap_or_default()
        );

        log::info!("Shutdown endpoint available at http://{control_address}{QUIT_PATH}");

        Ok(Self {
            config,
            public,
            control,
            public_address,
            control_address,
            public_app,
            control_app,
            signal,
            lifecycle: Lifecycle::new(),
            force,
        })
    }

    /// The address the public listener is bound to.
    pub fn public_address(&self) -> SocketAddr {
        self.public_address
    }

    /// The address the control listener is bound to.
    pub fn control_address(&self) -> SocketAddr {
        self.control_address
    }

    /// A handle firing the same shutdown as signals and the control endpoint.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.signal.clone()
    }

    /// Observes the lifecycle state of this gateway.
    pub fn lifecycle(&self) -> watch::Receiver<LifecycleState> {
        self.lifecycle.subscribe()
    }

    /// Serves until the first shutdown trigger, then drains both listeners.
    ///
    /// Draining is bounded by the configured shutdown timeout. Requests still
    /// running at the deadline are answered with 503 and their listener is
    /// reported as [`DrainOutcome::Forced`].
    pub async fn run(self) -> ShutdownReport {
        let Gateway {
            config,
            public,
            control,
            public_app,
            control_app,
            signal,
            lifecycle,
            force,
            ..
        } = self;

        let drain = CancellationToken::new();

        let public_task = listener::spawn(ListenerKind::Public, public, public_app, drain.clone());
        let control_task = listener::spawn(ListenerKind::Control, control, control_app, drain.clone());

        let supervisor = Supervisor {
            signal,
            lifecycle,
            drain,
            force,
            shutdown_timeout: config.server.shutdown_timeout,
        };

        supervisor.run(public_task, control_task).await
    }
}

/// Watches the two listener tasks and the shutdown signal, then drains.
struct Supervisor {
    signal: ShutdownSignal,
    lifecycle: Lifecycle,
    drain: CancellationToken,
    force: CancellationToken,
    shutdown_timeout: Duration,
}

impl Supervisor {
    async fn run(
        self,
        mut public_task: JoinHandle<io::Result<()>>,
        mut control_task: JoinHandle<io::Result<()>>,
    ) -> ShutdownReport {
        let Supervisor {
            signal,
            lifecycle,
            drain,
            force,
            shutdown_timeout,
        } = self;

        let os_signal = tokio::spawn({
            let signal = signal.clone();

            async move {
                let name = signal::wait().await;
                signal.fire(ShutdownTrigger::OsSignal(name));
            }
        });

        lifecycle.advance(LifecycleState::Running);

        let mut public_exit = None;
        let mut control_exit = None;

        let trigger = loop {
            tokio::select! {
                trigger = signal.fired() => break trigger,
                joined = &mut public_task, if public_exit.is_none() => {
                    let result = joined.unwrap_or_else(|e| Err(io::Error::other(e)));

                    if let Some(trigger) = lifecycle::on_listener_exit(ListenerKind::Public, &result) {
                        signal.fire(trigger);
                    }

                    public_exit = Some(result);
                }
                joined = &mut control_task, if control_exit.is_none() => {
                    let result = joined.unwrap_or_else(|e| Err(io::Error::other(e)));

                    if let Some(trigger) = lifecycle::on_listener_exit(ListenerKind::Control, &result) {
                        signal.fire(trigger);
                    }

                    control_exit = Some(result);
                }
            }
        };

        os_signal.abort();
        lifecycle.advance(LifecycleState::Draining);

        log::info!("Shutting down, draining in-flight requests for up to {shutdown_timeout:?}");

        drain.cancel();
        let deadline = Instant::now() + shutdown_timeout;

        let (public, control) = tokio::join!(
            listener::drain(ListenerKind::Public, public_task, public_exit, deadline, &force),
            listener::drain(ListenerKind::Control, control_task, control_exit, deadline, &force),
        );

        lifecycle.advance(LifecycleState::Stopped);

        let report = ShutdownReport {
            trigger,
            public,
            control,
        };

        if report.is_clean() {
            log::info!("Gateway stopped");
        } else {
            log::warn!("Gateway stopped, public listener drain: {:?}", report.public);
        }

        report
    }
}

async fn bind_listener(address: SocketAddr) -> anyhow::Result<TcpListener> {
    TcpListener::bind(address)
        .await
        .map_err(|e| anyhow!("Failed to bind to {address}: {e}"))
}

/// Binds and runs the gateway until it has shut down.
pub async fn serve(config: Config) -> anyhow::Result<ShutdownReport> {
    let gateway = Gateway::bind(config).await?;

    Ok(gateway.run().await)
}
