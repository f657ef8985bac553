mod input;
mod output;

use std::time::Instant;

use axum::{
    body::Bytes,
    http::{HeaderMap, Method, StatusCode},
};
use reqwest::{Client, header::AUTHORIZATION};
use secrecy::ExposeSecret;

pub(crate) use self::output::UpstreamModel;
use self::{input::UpstreamChatRequest, output::UpstreamChatResponse};

use crate::{
    error::LlmError,
    messages::{ChatCompletionRequest, ChatCompletionResponse},
    request::RequestContext,
};

/// Client for the upstream chat service.
///
/// No timeout is configured: a hung upstream holds the calling request until the
/// caller gives up or the gateway drains. Connections are not kept idle, every
/// call opens its own.
pub(crate) struct Upstream {
    client: Client,
    base_url: String,
}

impl Upstream {
    pub fn new(base_url: String) -> crate::Result<Self> {
        let client = Client::builder().pool_max_idle_per_host(0).build().map_err(|e| {
            log::error!("Failed to create HTTP client for the upstream: {e}");
            LlmError::InternalError(None)
        })?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sends a translated chat request to `<upstream>/chat` and translates the reply back.
    pub async fn chat(
        &self,
        request: ChatCompletionRequest,
        context: &RequestContext,
    ) -> crate::Result<ChatCompletionResponse> {
        let request_id = context.request_id.as_str();
        let url = format!("{}/chat", self.base_url);

        let original_model = request.model.clone();
        let upstream_request = UpstreamChatRequest::from(request);

        log::info!(request_id; "Forwarding chat completion to {url}");

        let mut request_builder = self.client.post(&url).json(&upstream_request);

        if let Some(authorization) = &context.authorization {
            request_builder = request_builder.header(AUTHORIZATION, authorization.expose_secret());
        }

        let started = Instant::now();
        let result = request_builder.send().await;
        let duration_ms = elapsed_ms(started);

        let response = result.map_err(|e| {
            log::error!(request_id, duration_ms; "Failed to contact upstream: {e}");
            LlmError::ConnectionError(format!("Failed to contact upstream: {e}"))
        })?;

        let status = response.status();
        let status_code = status.as_u16();

        log::info!(request_id, status_code, duration_ms; "Received chat response from upstream");

        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            log::error!(request_id, status_code; "Upstream rejected chat completion: {body}");

            return Err(LlmError::UpstreamRejected {
                status: status_code,
                body,
            });
        }

        // First get the response as text to log if parsing fails
        let response_text = response.text().await.map_err(|e| {
            log::error!(request_id; "Failed to read upstream chat response body: {e}");
            LlmError::InternalError(None)
        })?;

        let upstream_response: UpstreamChatResponse = sonic_rs::from_str(&response_text).map_err(|e| {
            log::error!(request_id; "Failed to parse upstream chat response: {e}");
            log::error!(request_id; "Raw response that failed to parse: {response_text}");
            LlmError::InternalError(None)
        })?;

        if let Some(upstream_status) = upstream_response.status.as_deref() {
            log::debug!(request_id; "Upstream reported chat status '{upstream_status}'");
        }

        Ok(upstream_response.into_completion(original_model))
    }

    /// Sends a request to `<upstream><target>` as-is and hands back the raw reply.
    ///
    /// `headers` must already be stripped of per-hop headers.
    pub async fn forward(
        &self,
        method: Method,
        target: &str,
        headers: HeaderMap,
        body: Bytes,
        context: &RequestContext,
    ) -> crate::Result<reqwest::Response> {
        let request_id = context.request_id.as_str();
        let url = format!("{}{target}", self.base_url);

        log::info!(request_id; "Forwarding {method} request to {url}");

        let mut request_builder = self.client.request(method, &url).headers(headers);

        if !body.is_empty() {
            request_builder = request_builder.body(body);
        }

        let started = Instant::now();
        let result = request_builder.send().await;
        let duration_ms = elapsed_ms(started);

        let response = result.map_err(|e| {
            log::error!(request_id, duration_ms; "Failed to forward request to {url}: {e}");
            LlmError::ConnectionError("Failed to contact upstream service".to_string())
        })?;

        let status_code = response.status().as_u16();
        log::info!(request_id, status_code, duration_ms; "Received response from upstream for {url}");

        Ok(response)
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
