use serde::Serialize;

use crate::messages::{ChatCompletionRequest, ChatMessage};

/// Request body of the upstream `/chat` endpoint.
#[derive(Debug, Serialize)]
pub(crate) struct UpstreamChatRequest {
    pub(crate) model: String,
    pub(crate) messages: Vec<ChatMessage>,
}

impl From<ChatCompletionRequest> for UpstreamChatRequest {
    fn from(request: ChatCompletionRequest) -> Self {
        Self {
            model: request.model,
            messages: request.messages,
        }
    }
}
