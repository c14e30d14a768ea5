//! Dify chat-messages client with the stale-conversation retry.

use crate::error::UpstreamError;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Production chat-messages endpoint.
pub const DIFY_CHAT_URL: &str = "https://api.dify.ai/v1/chat-messages";

/// Model responses are slow; the blocking call gets a generous timeout.
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(120);

/// Channel tag always present in the request inputs.
const FROM_CHANNEL: &str = "chatfuel";

/// Returned when the response carries neither an answer nor outputs text.
const MISSING_ANSWER_PLACEHOLDER: &str = "No answer returned from Dify.";

/// Normalize a conversation handle from the caller.
///
/// Chatfuel attributes echo back `""` or the literal string `"null"` for an
/// unset handle, and Dify rejects an empty `conversation_id` differently
/// than an absent one, so all three collapse to absent here.
pub fn normalize_handle(handle: Option<&str>) -> Option<String> {
    let handle = handle?.trim();
    if handle.is_empty() || handle.eq_ignore_ascii_case("null") {
        None
    } else {
        Some(handle.to_string())
    }
}

/// Client for the Dify chat-messages endpoint.
pub struct DifyClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

/// One answered turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    /// Raw answer text, markup included.
    pub answer: String,

    /// Conversation handle to carry into the next turn. Dify may renew it.
    pub conversation_id: Option<String>,
}

#[derive(Serialize)]
struct ChatMessageRequest<'a> {
    query: &'a str,
    response_mode: &'static str,
    user: &'a str,
    inputs: serde_json::Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    conversation_id: Option<&'a str>,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    answer: Option<String>,
    conversation_id: Option<String>,
    outputs: Option<ChatMessageOutputs>,
}

#[derive(Deserialize)]
struct ChatMessageOutputs {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    code: Option<String>,
}

impl DifyClient {
    /// Create a client against the production endpoint.
    pub fn new(api_key: impl Into<String>) -> anyhow::Result<Self> {
        Self::with_endpoint(api_key, DIFY_CHAT_URL)
    }

    /// Create a client against a specific endpoint (tests point this at a
    /// mock server).
    pub fn with_endpoint(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client for Dify")?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }

    /// Ask Dify a question in blocking response mode.
    ///
    /// If Dify rejects a supplied conversation handle as unknown (its
    /// conversation state expires independently of the caller's cached
    /// handle), the request is retried exactly once without the handle,
    /// starting a fresh conversation. Any other failure, or a second
    /// failure, propagates unretried.
    pub async fn ask(
        &self,
        question: &str,
        user_id: &str,
        conversation_id: Option<&str>,
        extra_inputs: &serde_json::Map<String, Value>,
    ) -> Result<ChatReply, UpstreamError> {
        let mut inputs = serde_json::Map::new();
        inputs.insert("from_channel".into(), Value::String(FROM_CHANNEL.into()));
        inputs.extend(extra_inputs.clone());

        let request = ChatMessageRequest {
            query: question,
            response_mode: "blocking",
            user: user_id,
            inputs,
            conversation_id,
        };

        match self.send(&request).await {
            Ok(reply) => Ok(reply),
            Err(error) if error.is_stale_conversation() && conversation_id.is_some() => {
                tracing::warn!(
                    conversation_id = conversation_id.unwrap_or_default(),
                    "dify does not know this conversation, retrying without it"
                );
                let retry = ChatMessageRequest {
                    conversation_id: None,
                    ..request
                };
                self.send(&retry).await
            }
            Err(error) => Err(error),
        }
    }

    async fn send(&self, request: &ChatMessageRequest<'_>) -> Result<ChatReply, UpstreamError> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let code = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|e| e.code);
            return Err(UpstreamError::Api {
                status: status.as_u16(),
                code,
                body,
            });
        }

        let parsed: ChatMessageResponse = serde_json::from_str(&body)
            .with_context(|| format!("unparseable dify response: {body}"))?;

        let answer = parsed
            .answer
            .or(parsed.outputs.and_then(|o| o.text))
            .unwrap_or_else(|| MISSING_ANSWER_PLACEHOLDER.to_string());

        Ok(ChatReply {
            answer,
            conversation_id: parsed.conversation_id,
        })
    }
}
