//! OpenAI-compatible API surface in front of an upstream chat service.
//!
//! Chat completions are translated between the two wire formats. Every other
//! GET or POST is forwarded to the upstream with the `/v1` prefix removed.

use std::sync::Arc;

use anyhow::anyhow;
use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{Request, State},
    http::{Method, request::Parts},
    response::{IntoResponse, Response},
};
use config::Config;
use messages::ChatCompletionRequest;

mod error;
mod messages;
mod passthrough;
mod request;
mod upstream;

use error::LlmError;
use request::RequestContext;

pub use request::request_id;
use upstream::Upstream;

pub(crate) type Result<T> = std::result::Result<T, LlmError>;

/// The only path translated between the two wire formats.
const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// Creates an axum router answering every path of the public API.
///
/// The router has no explicit routes: dispatch happens in its fallback, so any
/// path not handled elsewhere ends up forwarded to the upstream.
pub fn router(config: &Config) -> anyhow::Result<Router> {
    let base_url = config
        .upstream
        .base_url()
        .ok_or_else(|| anyhow!("No upstream URL configured"))?;

    let upstream =
        Upstream::new(base_url).map_err(|e| anyhow!("Failed to initialize the upstream client: {e}"))?;

    log::debug!("Forwarding API requests to {}", upstream.base_url());

    Ok(Router::new().fallback(dispatch).with_state(Arc::new(upstream)))
}

/// Where a request goes, decided from its method and path alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    ChatCompletions,
    Passthrough,
}

fn route(method: &Method, path: &str) -> Result<Route> {
    if *method != Method::GET && *method != Method::POST {
        return Err(LlmError::MethodNotAllowed(method.clone()));
    }

    if path == CHAT_COMPLETIONS_PATH {
        Ok(Route::ChatCompletions)
    } else {
        Ok(Route::Passthrough)
    }
}

async fn dispatch(State(upstream): State<Arc<Upstream>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let context = request::extract_context(&parts.headers);
    let request_id = context.request_id.as_str();

    log::info!(request_id; "Received request: {} {}", parts.method, parts.uri.path());

    let result = match route(&parts.method, parts.uri.path()) {
        Ok(Route::ChatCompletions) => chat_completions(&upstream, body, &context).await,
        Ok(Route::Passthrough) => forward(&upstream, parts, body, &context).await,
        Err(error) => Err(error),
    };

    result.unwrap_or_else(|error| {
        let status_code = error.status_code().as_u16();

        if error.status_code().is_server_error() {
            log::error!(request_id, status_code; "Request failed: {error}");
        } else {
            log::warn!(request_id, status_code; "Request rejected: {error}");
        }

        error.into_response()
    })
}

/// Handle chat completion requests by translating them for the upstream.
async fn chat_completions(upstream: &Upstream, body: Body, context: &RequestContext) -> Result<Response> {
    let request_id = context.request_id.as_str();
    let body = read_body(body, context).await?;

    let request: ChatCompletionRequest = serde_json::from_slice(&body).map_err(|e| {
        log::error!(request_id; "Invalid JSON format: {e}, body: {}", String::from_utf8_lossy(&body));
        LlmError::InvalidRequest("Invalid JSON format".to_string())
    })?;

    log::info!(
        request_id;
        "Handling chat completion request for model {} with {} messages",
        request.model,
        request.messages.len()
    );

    let response = upstream.chat(request, context).await?;

    log::info!(request_id, response_id = response.id.as_str(); "Chat completion handled successfully");

    Ok(Json(response).into_response())
}

async fn forward(upstream: &Upstream, parts: Parts, body: Body, context: &RequestContext) -> Result<Response> {
    let body = read_body(body, context).await?;

    passthrough::forward(upstream, parts.method, &parts.uri, &parts.headers, body, context).await
}

async fn read_body(body: Body, context: &RequestContext) -> Result<Bytes> {
    axum::body::to_bytes(body, usize::MAX).await.map_err(|e| {
        log::error!(request_id = context.request_id.as_str(); "Failed to read request body: {e}");
        LlmError::InvalidRequest("Failed to read request body".to_string())
    })
}
