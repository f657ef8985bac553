mod upstream;

use std::{net::SocketAddr, time::Duration};

use config::Config;
use reqwest::Method;
use server::{Gateway, LifecycleState, ShutdownReport, ShutdownSignal};
use tokio::{sync::watch, task::JoinHandle};

pub use upstream::{ECHO_STATUS_HEADER, RecordedRequest, RunningUpstream, UpstreamMock};

/// Test client for making HTTP requests to one of the gateway listeners
pub struct TestClient {
    base_url: String,
    client: reqwest::Client,
}

impl TestClient {
    /// Create a new test client for the given address, always dialled over loopback
    pub fn new(address: SocketAddr) -> Self {
        Self {
            base_url: format!("http://127.0.0.1:{}", address.port()),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a POST request to the given path with JSON body
    pub async fn post<T: serde::Serialize>(&self, path: &str, body: &T) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .unwrap()
    }

    /// Send a POST request with a body that is not necessarily valid JSON
    pub async fn post_raw(&self, path: &str, body: &'static str) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .unwrap()
    }

    /// Send a GET request to the given path
    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .unwrap()
    }

    /// Start building a request with any method
    pub fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.client.request(method, format!("{}{}", self.base_url, path))
    }
}

/// A gateway running the real lifecycle on ephemeral ports
pub struct TestGateway {
    pub client: TestClient,
    pub control: TestClient,
    pub public_address: SocketAddr,
    pub control_address: SocketAddr,
    signal: ShutdownSignal,
    lifecycle: watch::Receiver<LifecycleState>,
    handle: JoinHandle<ShutdownReport>,
}

impl TestGateway {
    /// Start a gateway with the given TOML configuration. Both ports are replaced
    /// with ephemeral ones.
    pub async fn start(config_toml: &str) -> Self {
        let mut config: Config = toml::from_str(config_toml).unwrap();
        config.server.port = 0;
        config.server.control.port = 0;

        let gateway = Gateway::bind(config).await.unwrap();

        let public_address = gateway.public_address();
        let control_address = gateway.control_address();
        let signal = gateway.shutdown_signal();
        let mut lifecycle = gateway.lifecycle();

        let handle = tokio::spawn(gateway.run());

        tokio::time::timeout(
            Duration::from_secs(5),
            lifecycle.wait_for(|state| *state >= LifecycleState::Running),
        )
        .await
        .unwrap()
        .unwrap();

        Self {
            client: TestClient::new(public_address),
            control: TestClient::new(control_address),
            public_address,
            control_address,
            signal,
            lifecycle,
            handle,
        }
    }

    /// Start a gateway forwarding to `upstream` with otherwise default settings
    pub async fn with_upstream(upstream: &RunningUpstream) -> Self {
        Self::start(&format!("[upstream]\nurl = \"{}\"\n", upstream.url())).await
    }

    pub fn shutdown_signal(&self) -> &ShutdownSignal {
        &self.signal
    }

    /// Observe the lifecycle, also after the gateway has been consumed by [`stopped`](Self::stopped)
    pub fn lifecycle(&self) -> watch::Receiver<LifecycleState> {
        self.lifecycle.clone()
    }

    /// Call the quit endpoint on the control listener
    pub async fn quit(&self) -> reqwest::Response {
        self.control
            .request(Method::POST, server::QUIT_PATH)
            .send()
            .await
            .unwrap()
    }

    /// Wait for the gateway to stop, failing after `limit`
    pub async fn stopped(self, limit: Duration) -> ShutdownReport {
        tokio::time::timeout(limit, self.handle).await.unwrap().unwrap()
    }
}
