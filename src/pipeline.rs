//! Background turn pipeline: ask Dify, normalize, segment, deliver.
//!
//! Runs as an independent spawned task after the webhook handler has already
//! acked. Every failure here is terminal for the turn and logged for the
//! operator; the end user learns of failure only through the absence of a
//! follow-up message.

use crate::chatfuel::ChatfuelBroadcaster;
use crate::dify::DifyClient;
use crate::format;
use crate::segment::{self, DEFAULT_SEGMENT_SIZE};

use std::sync::Arc;

/// One inbound turn, parsed and normalized from the webhook request.
#[derive(Debug, Clone)]
pub struct Turn {
    pub user_id: String,
    pub question: String,

    /// Conversation handle from the caller, already normalized (absent on a
    /// fresh conversation).
    pub conversation_id: Option<String>,

    /// Caller-supplied extra context forwarded to Dify.
    pub extra_inputs: serde_json::Map<String, serde_json::Value>,

    /// Delivery-target block override for this turn.
    pub block_id: Option<String>,
}

/// Shared collaborators for turn processing.
///
/// Either side may be absent when its credentials are not configured; the
/// affected step is skipped with a warning instead of crashing.
pub struct Bridge {
    pub dify: Option<DifyClient>,
    pub chatfuel: Option<ChatfuelBroadcaster>,
}

/// Run one turn end to end.
pub async fn run_turn(bridge: Arc<Bridge>, turn: Turn) {
    let Some(dify) = &bridge.dify else {
        tracing::warn!(user_id = %turn.user_id, "DIFY_API_KEY missing, skipping turn");
        return;
    };

    let reply = match dify
        .ask(
            &turn.question,
            &turn.user_id,
            turn.conversation_id.as_deref(),
            &turn.extra_inputs,
        )
        .await
    {
        Ok(reply) => reply,
        Err(error) => {
            tracing::error!(%error, user_id = %turn.user_id, "dify call failed");
            return;
        }
    };

    // Dify may renew the handle; otherwise carry the inbound one forward.
    let next_conversation_id = reply
        .conversation_id
        .clone()
        .or_else(|| turn.conversation_id.clone())
        .unwrap_or_default();

    let normalized = format::normalize(&reply.answer);
    let segments = segment::segment(&normalized.body, DEFAULT_SEGMENT_SIZE);
    if segments.is_empty() {
        tracing::warn!(user_id = %turn.user_id, "nothing left to deliver after normalization");
        return;
    }

    let Some(chatfuel) = &bridge.chatfuel else {
        tracing::warn!(
            user_id = %turn.user_id,
            "chatfuel broadcast credentials missing, can't send final answer"
        );
        return;
    };

    tracing::info!(
        user_id = %turn.user_id,
        conversation_id = %next_conversation_id,
        total_length = normalized.body.len(),
        segments = segments.len(),
        citations = normalized.citations.len(),
        "broadcasting answer"
    );

    if let Err(error) = chatfuel
        .deliver(
            &turn.user_id,
            &segments,
            &next_conversation_id,
            normalized.citation_block.as_deref(),
            turn.block_id.as_deref(),
        )
        .await
    {
        tracing::error!(%error, user_id = %turn.user_id, "broadcast failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(conversation_id: Option<&str>) -> Turn {
        Turn {
            user_id: "user-1".into(),
            question: "what is rust?".into(),
            conversation_id: conversation_id.map(str::to_string),
            extra_inputs: serde_json::Map::new(),
            block_id: None,
        }
    }

    #[tokio::test]
    async fn full_turn_normalizes_and_delivers_with_renewed_handle() {
        let mut server = mockito::Server::new_async().await;

        let dify_mock = server
            .mock("POST", "/chat-messages")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"answer":"Read <a href=\"https://x.com/a\">Docs</a>","conversation_id":"conv-2"}"#,
            )
            .create_async()
            .await;

        let broadcast_mock = server
            .mock("POST", "/bots/bot-1/users/user-1/send")
            .match_query(mockito::Matcher::Any)
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "dify_answer": "Read ¹",
                "dify_sources": "¹ Docs\nhttps://x.com/a",
                "dify_conversation_id": "conv-2",
            })))
            .with_status(200)
            .with_body("{}")
            .expect(1)
            .create_async()
            .await;

        let bridge = Arc::new(Bridge {
            dify: Some(
                DifyClient::with_endpoint("key", format!("{}/chat-messages", server.url()))
                    .unwrap(),
            ),
            chatfuel: Some(
                ChatfuelBroadcaster::with_base_url("bot-1", "tok", "block-1", server.url())
                    .unwrap(),
            ),
        });

        run_turn(bridge, turn(Some("conv-1"))).await;

        dify_mock.assert_async().await;
        broadcast_mock.assert_async().await;
    }

    #[tokio::test]
    async fn missing_upstream_credentials_skip_the_turn() {
        let bridge = Arc::new(Bridge {
            dify: None,
            chatfuel: None,
        });

        // Nothing to assert beyond "does not panic / does not hang".
        run_turn(bridge, turn(None)).await;
    }
}
