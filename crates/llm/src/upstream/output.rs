use serde::Deserialize;

use crate::messages::{ChatCompletionResponse, ChatMessage, MODEL_OWNER, Model, ObjectType, null_as_default};

/// Response body of the upstream `/chat` endpoint.
///
/// A reply without a message becomes an empty assistant turn.
#[derive(Debug, Deserialize)]
pub(crate) struct UpstreamChatResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) message: ChatMessage,
    #[serde(default)]
    pub(crate) status: Option<String>,
}

impl UpstreamChatResponse {
    /// Translates the reply into an OpenAI completion answering for `model`.
    pub(crate) fn into_completion(self, model: String) -> ChatCompletionResponse {
        ChatCompletionResponse::single(model, self.message)
    }
}

/// One entry of the upstream `/models` array.
#[derive(Debug, Deserialize)]
pub(crate) struct UpstreamModel {
    pub(crate) id: String,
    #[serde(default)]
    pub(crate) name: Option<String>,
    #[serde(default)]
    pub(crate) status: Option<String>,
}

impl From<UpstreamModel> for Model {
    fn from(model: UpstreamModel) -> Self {
        Self {
            id: model.id,
            object: ObjectType::Model,
            owned_by: MODEL_OWNER.to_string(),
        }
    }
}
