//! Forwarding of every request that is not a chat completion.
//!
//! Requests go to the upstream with the version prefix removed. Replies are relayed
//! verbatim except for the model listing, which is reshaped into an OpenAI list.

use axum::{
    Json,
    body::{Body, Bytes},
    http::{HeaderMap, HeaderName, Method, Uri, header},
    response::{IntoResponse, Response},
};

use crate::{
    error::LlmError,
    messages::{Model, ModelsResponse},
    request::RequestContext,
    upstream::{Upstream, UpstreamModel},
};

/// Prefix removed from the inbound path before forwarding.
const VERSION_PREFIX: &str = "/v1";

/// The only path whose reply is reshaped.
pub(crate) const MODELS_PATH: &str = "/v1/models";

/// Inbound headers recomputed for the outbound hop.
fn is_skipped_request_header(name: &HeaderName) -> bool {
    *name == header::HOST || *name == header::CONTENT_LENGTH
}

/// Upstream response headers describing the upstream connection, not the payload.
fn is_skipped_response_header(name: &HeaderName) -> bool {
    *name == header::CONNECTION || *name == header::TRANSFER_ENCODING || name.as_str() == "keep-alive"
}

/// Builds the upstream path and query for an inbound URI.
pub(crate) fn target(uri: &Uri) -> String {
    let path = uri.path();
    let path = path.strip_prefix(VERSION_PREFIX).unwrap_or(path);

    match uri.query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    }
}

pub(crate) fn forwarded_headers(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = HeaderMap::with_capacity(headers.len());

    for (name, value) in headers {
        if !is_skipped_request_header(name) {
            forwarded.append(name.clone(), value.clone());
        }
    }

    forwarded
}

pub(crate) async fn forward(
    upstream: &Upstream,
    method: Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: Bytes,
    context: &RequestContext,
) -> crate::Result<Response> {
    let target = target(uri);
    let reshaped = uri.path() == MODELS_PATH;

    let mut headers = forwarded_headers(headers);

    // the listing is parsed here, so it has to arrive uncompressed
    if reshaped {
        headers.remove(header::ACCEPT_ENCODING);
    }

    let response = upstream.forward(method, &target, headers, body, context).await?;

    if reshaped && response.status().is_success() {
        return reshape_models(response, context).await;
    }

    log::info!(
        request_id = context.request_id.as_str(), status_code = response.status().as_u16();
        "Forwarded {} to {target}", uri.path()
    );

    Ok(relay(response))
}

/// Streams the upstream reply back with its status and headers.
fn relay(response: reqwest::Response) -> Response {
    let status = response.status();
    let upstream_headers = response.headers().clone();

    let mut relayed = Response::new(Body::from_stream(response.bytes_stream()));
    *relayed.status_mut() = status;

    let headers = relayed.headers_mut();

    for (name, value) in &upstream_headers {
        if !is_skipped_response_header(name) {
            headers.append(name.clone(), value.clone());
        }
    }

    relayed
}

async fn reshape_models(response: reqwest::Response, context: &RequestContext) -> crate::Result<Response> {
    let request_id = context.request_id.as_str();
    let status = response.status();

    let body = response.bytes().await.map_err(|e| {
        log::error!(request_id; "Failed to read upstream models response body: {e}");
        LlmError::InternalError(None)
    })?;

    let models: Vec<UpstreamModel> = sonic_rs::from_slice(&body).map_err(|e| {
        log::error!(request_id; "Failed to parse upstream models list: {e}");
        log::error!(request_id; "Raw response that failed to parse: {}", String::from_utf8_lossy(&body));
        LlmError::InternalError(None)
    })?;

    for model in &models {
        log::debug!(
            request_id;
            "Upstream model '{}' (name: {:?}, status: {:?})",
            model.id,
            model.name,
            model.status
        );
    }

    let response: ModelsResponse = models.into_iter().map(Model::from).collect();

    log::info!(request_id; "Returning {} models", response.data.len());

    Ok((status, Json(response)).into_response())
}
