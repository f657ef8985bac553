use axum::http::{HeaderMap, header::AUTHORIZATION};
use secrecy::SecretString;

const REQUEST_ID_LENGTH: usize = 8;

/// Per-request context carried through dispatch and upstream calls.
#[derive(Debug, Clone)]
pub(crate) struct RequestContext {
    /// Correlation id attached to every log line of this request.
    pub request_id: String,
    /// The caller's `Authorization` header, relayed to the upstream untouched.
    pub authorization: Option<SecretString>,
}

/// Extract request context from request headers.
pub(super) fn extract_context(headers: &HeaderMap) -> RequestContext {
    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(|value| SecretString::from(value.to_string()));

    RequestContext {
        request_id: request_id(),
        authorization,
    }
}

/// A short random id correlating the log lines of one request.
pub fn request_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(REQUEST_ID_LENGTH);
    id
}
