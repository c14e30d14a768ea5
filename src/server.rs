//! HTTP server: health check and the Chatfuel webhook.

use crate::dify::normalize_handle;
use crate::pipeline::{self, Bridge, Turn};

use axum::Router;
use axum::extract::State;
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;

/// Synchronous reply Chatfuel renders while the real answer is produced.
const ACK_TEXT: &str = "Thinking… I'll reply shortly!";

/// Inbound turn request from Chatfuel's JSON API block.
///
/// Chatfuel setups differ in which attribute carries the user text, so both
/// the primary and the legacy key are accepted.
#[derive(Debug, Default, Deserialize)]
pub struct TurnRequest {
    user_text: Option<String>,

    #[serde(rename = "chatfuel user input")]
    chatfuel_user_input: Option<String>,

    /// Conversation handle persisted as a user attribute on the last turn.
    /// Chatfuel echoes `""` or `"null"` when unset; normalized before use.
    dify_conversation_id: Option<String>,

    chatfuel_user_id: Option<String>,
    messenger_user_id: Option<String>,

    /// Extra context merged into the Dify inputs.
    #[serde(default)]
    inputs: serde_json::Map<String, serde_json::Value>,

    /// Routing discriminator: which Chatfuel block renders the answer.
    answer_block_id: Option<String>,
}

impl TurnRequest {
    fn question(&self) -> String {
        self.user_text
            .as_deref()
            .or(self.chatfuel_user_input.as_deref())
            .unwrap_or_default()
            .trim()
            .to_string()
    }

    fn user_id(&self) -> Option<&str> {
        self.chatfuel_user_id
            .as_deref()
            .or(self.messenger_user_id.as_deref())
    }
}

// -- Response types --

#[derive(Serialize)]
struct AckResponse {
    messages: Vec<AckMessage>,
}

#[derive(Serialize)]
struct AckMessage {
    text: &'static str,
}

/// Build the bridge router.
pub fn router(bridge: Arc<Bridge>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/chatfuel", post(chatfuel_webhook))
        .with_state(bridge)
}

/// Start the HTTP server on the given address.
pub async fn start_http_server(
    bind: SocketAddr,
    bridge: Arc<Bridge>,
    shutdown_rx: tokio::sync::watch::Receiver<bool>,
) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    let app = router(bridge);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(%bind, "HTTP server listening");

    let handle = tokio::spawn(async move {
        let mut shutdown = shutdown_rx;
        if let Err(error) = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.wait_for(|v| *v).await;
            })
            .await
        {
            tracing::error!(%error, "HTTP server exited with error");
        }
    });

    Ok(handle)
}

// -- Handlers --

async fn health() -> &'static str {
    "Chatfuel ↔ Dify bridge is running."
}

/// Accept a turn, ack immediately, and hand the real work to a background
/// task. The spawned pipeline owns its own error handling; nothing after
/// this point reaches the inbound connection.
async fn chatfuel_webhook(
    State(bridge): State<Arc<Bridge>>,
    axum::Json(request): axum::Json<TurnRequest>,
) -> axum::Json<AckResponse> {
    match request.user_id() {
        Some(user_id) => {
            let turn = Turn {
                user_id: user_id.to_string(),
                question: request.question(),
                conversation_id: normalize_handle(request.dify_conversation_id.as_deref()),
                extra_inputs: request.inputs.clone(),
                block_id: request.answer_block_id.clone(),
            };
            tokio::spawn(pipeline::run_turn(bridge, turn));
        }
        None => {
            tracing::warn!("missing user id, can't send a follow-up via broadcast");
        }
    }

    axum::Json(AckResponse {
        messages: vec![AckMessage { text: ACK_TEXT }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_the_legacy_user_text_key() {
        let request: TurnRequest = serde_json::from_str(
            r#"{"chatfuel user input": "  hello  ", "messenger_user_id": "m-1"}"#,
        )
        .unwrap();

        assert_eq!(request.question(), "hello");
        assert_eq!(request.user_id(), Some("m-1"));
    }

    #[test]
    fn primary_keys_win_over_alternates() {
        let request: TurnRequest = serde_json::from_str(
            r#"{
                "user_text": "primary",
                "chatfuel user input": "legacy",
                "chatfuel_user_id": "c-1",
                "messenger_user_id": "m-1"
            }"#,
        )
        .unwrap();

        assert_eq!(request.question(), "primary");
        assert_eq!(request.user_id(), Some("c-1"));
    }

    #[test]
    fn missing_fields_default_cleanly() {
        let request: TurnRequest = serde_json::from_str("{}").unwrap();

        assert_eq!(request.question(), "");
        assert_eq!(request.user_id(), None);
        assert!(request.inputs.is_empty());
        assert!(request.answer_block_id.is_none());
    }

    #[test]
    fn ack_payload_matches_the_chatfuel_shape() {
        let ack = AckResponse {
            messages: vec![AckMessage { text: ACK_TEXT }],
        };
        assert_eq!(
            serde_json::to_value(&ack).unwrap(),
            serde_json::json!({"messages": [{"text": "Thinking… I'll reply shortly!"}]})
        );
    }
}
