use std::{
    io::Write,
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    Json, Router,
    body::Bytes,
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use flate2::{Compression, write::GzEncoder};
use serde_json::json;
use tokio::net::TcpListener;

/// Header the echo endpoint reads to pick its response status.
pub const ECHO_STATUS_HEADER: &str = "x-echo-status";

/// A request the mock received.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    /// Path and query as received.
    pub target: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Address of the connection the request arrived on.
    pub peer: SocketAddr,
}

impl RecordedRequest {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

/// Builder for a server imitating the Open-WebUI API.
///
/// Answers `POST /chat`, `GET /models` and `GET /health`. Every other path
/// echoes the request back as JSON. The model list and the echo are gzipped
/// when the request accepts it.
pub struct UpstreamMock {
    reply: String,
    models: serde_json::Value,
    chat_error: Option<(StatusCode, String)>,
    chat_delay: Option<Duration>,
    raw_chat_body: Option<String>,
    health_status: StatusCode,
}

impl Default for UpstreamMock {
    fn default() -> Self {
        Self {
            reply: "Hello from the upstream".to_string(),
            models: json!([
                {"id": "llama3", "name": "Llama 3", "status": "ready"},
                {"id": "mistral", "name": "Mistral"}
            ]),
            chat_error: None,
            chat_delay: None,
            raw_chat_body: None,
            health_status: StatusCode::OK,
        }
    }
}

impl UpstreamMock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(mut self, content: impl Into<String>) -> Self {
        self.reply = content.into();
        self
    }

    pub fn with_models(mut self, models: serde_json::Value) -> Self {
        self.models = models;
        self
    }

    pub fn with_chat_error(mut self, status: StatusCode, body: impl Into<String>) -> Self {
        self.chat_error = Some((status, body.into()));
        self
    }

    /// Sends `body` verbatim as a 200 reply to `/chat`.
    pub fn with_raw_chat_body(mut self, body: impl Into<String>) -> Self {
        self.raw_chat_body = Some(body.into());
        self
    }

    pub fn with_chat_delay(mut self, delay: Duration) -> Self {
        self.chat_delay = Some(delay);
        self
    }

    pub fn with_health_status(mut self, status: StatusCode) -> Self {
        self.health_status = status;
        self
    }

    pub async fn spawn(self) -> RunningUpstream {
        let state = Arc::new(MockState {
            mock: self,
            requests: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/chat", post(chat))
            .route("/models", get(models))
            .route("/health", get(health))
            .fallback(echo)
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
                .await
                .unwrap();
        });

        RunningUpstream { address, state }
    }
}

/// A spawned [`UpstreamMock`].
pub struct RunningUpstream {
    address: SocketAddr,
    state: Arc<MockState>,
}

impl RunningUpstream {
    pub fn url(&self) -> String {
        format!("http://{}", self.address)
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    /// Requests received on `target`, which includes the query if any.
    pub fn requests_to(&self, target: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.target == target)
            .collect()
    }
}

struct MockState {
    mock: UpstreamMock,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockState {
    async fn record(&self, request: Request) -> RecordedRequest {
        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();

        let target = parts
            .uri
            .path_and_query()
            .map(|target| target.as_str().to_string())
            .unwrap_or_default();

        let ConnectInfo(peer) = *parts.extensions.get::<ConnectInfo<SocketAddr>>().unwrap();

        let recorded = RecordedRequest {
            method: parts.method,
            target,
            headers: parts.headers,
            body,
            peer,
        };

        self.requests.lock().unwrap().push(recorded.clone());

        recorded
    }
}

async fn chat(State(state): State<Arc<MockState>>, request: Request) -> Response {
    let recorded = state.record(request).await;
    let mock = &state.mock;

    if let Some(delay) = mock.chat_delay {
        tokio::time::sleep(delay).await;
    }

    if let Some((status, body)) = &mock.chat_error {
        return (*status, body.clone()).into_response();
    }

    if let Some(body) = &mock.raw_chat_body {
        return body.clone().into_response();
    }

    let request = recorded.json();
    log::debug!("Mock upstream received chat for model {}", request["model"]);

    Json(json!({
        "message": {"role": "assistant", "content": mock.reply},
        "status": "ok"
    }))
    .into_response()
}

async fn models(State(state): State<Arc<MockState>>, request: Request) -> Response {
    let recorded = state.record(request).await;

    json_reply(&recorded, StatusCode::OK, &state.mock.models)
}

async fn health(State(state): State<Arc<MockState>>, request: Request) -> Response {
    state.record(request).await;

    (state.mock.health_status, "healthy").into_response()
}

async fn echo(State(state): State<Arc<MockState>>, request: Request) -> Response {
    let recorded = state.record(request).await;

    let status = recorded
        .headers
        .get(ECHO_STATUS_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or(StatusCode::OK);

    let body = json!({
        "method": recorded.method.as_str(),
        "target": recorded.target,
        "body": String::from_utf8_lossy(&recorded.body),
    });

    let mut response = json_reply(&recorded, status, &body);
    response
        .headers_mut()
        .insert("x-upstream", HeaderValue::from_static("mock"));

    response
}

/// A JSON reply, gzipped if the request's `Accept-Encoding` allows it.
fn json_reply(request: &RecordedRequest, status: StatusCode, body: &serde_json::Value) -> Response {
    let accepts_gzip = request
        .headers
        .get(header::ACCEPT_ENCODING)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains("gzip"));

    if !accepts_gzip {
        return (status, Json(body)).into_response();
    }

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&serde_json::to_vec(body).unwrap()).unwrap();

    (
        status,
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::CONTENT_ENCODING, "gzip"),
        ],
        encoder.finish().unwrap(),
    )
        .into_response()
}
