use serde::{Deserialize, Deserializer, Serialize};

/// Prefix of every synthesized completion id.
const COMPLETION_ID_PREFIX: &str = "chatcmpl-";

/// Owner reported for every model the upstream lists.
pub(crate) const MODEL_OWNER: &str = "open-webui";

/// OpenAI-compatible chat completion request.
///
/// Fields the upstream has no use for (temperature, stream, tools...) are ignored.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ChatCompletionRequest {
    pub(crate) model: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) messages: Vec<ChatMessage>,
}

/// Chat message in OpenAI format. The upstream uses the same shape.
///
/// A missing or `null` role or content reads as an empty string. Assistant
/// messages carrying tool calls send `"content": null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub(crate) struct ChatMessage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) role: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(crate) content: String,
}

/// Reads an explicit `null` as the type's default value.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) enum ObjectType {
    #[serde(rename = "chat.completion")]
    ChatCompletion,
    #[serde(rename = "list")]
    List,
    #[serde(rename = "model")]
    Model,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum FinishReason {
    Stop,
}

/// OpenAI-compatible chat completion response.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChatCompletionResponse {
    pub(crate) id: String,
    pub(crate) object: ObjectType,
    pub(crate) created: i64,
    pub(crate) model: String,
    pub(crate) choices: Vec<ChatChoice>,
    pub(crate) usage: Usage,
}

impl ChatCompletionResponse {
    /// Wraps a single upstream message into a completion for `model`.
    ///
    /// The upstream never reports token counts, so usage is always zero.
    pub(crate) fn single(model: String, message: ChatMessage) -> Self {
        Self {
            id: completion_id(),
            object: ObjectType::ChatCompletion,
            created: jiff::Timestamp::now().as_second(),
            model,
            choices: vec![ChatChoice {
                index: 0,
                message,
                finish_reason: FinishReason::Stop,
            }],
            usage: Usage::default(),
        }
    }
}

fn completion_id() -> String {
    format!("{COMPLETION_ID_PREFIX}{}", uuid::Uuid::new_v4().simple())
}

/// Chat completion choice.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChatChoice {
    pub(crate) index: u32,
    pub(crate) message: ChatMessage,
    pub(crate) finish_reason: FinishReason,
}

/// Token usage information.
#[derive(Debug, Clone, Default, Serialize)]
pub(crate) struct Usage {
    pub(crate) prompt_tokens: u32,
    pub(crate) completion_tokens: u32,
    pub(crate) total_tokens: u32,
}

/// Model information.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct Model {
    pub(crate) id: String,
    pub(crate) object: ObjectType,
    pub(crate) owned_by: String,
}

/// Models list response.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ModelsResponse {
    pub(crate) object: ObjectType,
    pub(crate) data: Vec<Model>,
}

impl FromIterator<Model> for ModelsResponse {
    fn from_iter<T: IntoIterator<Item = Model>>(iter: T) -> Self {
        Self {
            object: ObjectType::List,
            data: iter.into_iter().collect(),
        }
    }
}
