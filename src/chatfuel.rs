//! Chatfuel broadcast dispatcher: pushes answer segments to a user.

use crate::error::DeliveryError;

use anyhow::Context as _;
use serde::Serialize;

/// Production Chatfuel API root.
pub const CHATFUEL_API_URL: &str = "https://api.chatfuel.com";

/// Broadcast pushes are small; they fail fast.
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Client for the per-user broadcast endpoint.
pub struct ChatfuelBroadcaster {
    http: reqwest::Client,
    base_url: String,
    bot_id: String,
    token: String,
    default_block_id: String,
}

/// One pushed segment. The conversation handle rides along so the block can
/// persist it as a user attribute for the next turn.
#[derive(Serialize)]
struct BroadcastBody<'a> {
    dify_answer: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dify_sources: Option<&'a str>,
    dify_conversation_id: &'a str,
}

impl ChatfuelBroadcaster {
    /// Create a broadcaster against the production API.
    pub fn new(
        bot_id: impl Into<String>,
        token: impl Into<String>,
        default_block_id: impl Into<String>,
    ) -> anyhow::Result<Self> {
        Self::with_base_url(bot_id, token, default_block_id, CHATFUEL_API_URL)
    }

    /// Create a broadcaster against a specific API root (tests point this at
    /// a mock server).
    pub fn with_base_url(
        bot_id: impl Into<String>,
        token: impl Into<String>,
        default_block_id: impl Into<String>,
        base_url: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client for Chatfuel")?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            bot_id: bot_id.into(),
            token: token.into(),
            default_block_id: default_block_id.into(),
        })
    }

    /// Push `segments` to a user, in order.
    ///
    /// The citation block is attached to every segment — each push payload
    /// is stateless, so a reader of any one segment gets the sources. A
    /// failed push aborts the remaining segments; nothing is reordered or
    /// re-sent.
    pub async fn deliver(
        &self,
        user_id: &str,
        segments: &[String],
        conversation_id: &str,
        citation_block: Option<&str>,
        block_id: Option<&str>,
    ) -> Result<(), DeliveryError> {
        let url = format!(
            "{}/bots/{}/users/{}/send",
            self.base_url,
            self.bot_id,
            urlencoding::encode(user_id)
        );
        let block_id = block_id.unwrap_or(&self.default_block_id);

        for (index, segment) in segments.iter().enumerate() {
            let body = BroadcastBody {
                dify_answer: segment,
                dify_sources: citation_block,
                dify_conversation_id: conversation_id,
            };

            let response = self
                .http
                .post(&url)
                .query(&[
                    ("chatfuel_token", self.token.as_str()),
                    ("chatfuel_block_id", block_id),
                ])
                .json(&body)
                .send()
                .await
                .map_err(|source| DeliveryError::Transport {
                    segment: index,
                    source,
                })?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(DeliveryError::Api {
                    segment: index,
                    status: status.as_u16(),
                    body,
                });
            }

            tracing::debug!(
                user_id,
                segment = index + 1,
                total = segments.len(),
                "sent segment via chatfuel broadcast"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn broadcaster(server: &mockito::Server) -> ChatfuelBroadcaster {
        ChatfuelBroadcaster::with_base_url("bot-1", "tok", "block-1", server.url()).unwrap()
    }

    #[tokio::test]
    async fn segments_are_pushed_in_order_with_credentials() {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("POST", "/bots/bot-1/users/user-1/send")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("chatfuel_token".into(), "tok".into()),
                mockito::Matcher::UrlEncoded("chatfuel_block_id".into(), "block-1".into()),
            ]))
            .with_status(200)
            .with_body("{}")
            .expect(2)
            .create_async()
            .await;

        let segments = vec!["part one".to_string(), "part two".to_string()];
        broadcaster(&server)
            .deliver("user-1", &segments, "conv-1", None, None)
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn citation_block_rides_on_every_segment() {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("POST", "/bots/bot-1/users/user-1/send")
            .match_query(mockito::Matcher::Any)
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "dify_sources": "¹ Source\nhttps://x.com/a",
                "dify_conversation_id": "conv-1",
            })))
            .with_status(200)
            .with_body("{}")
            .expect(2)
            .create_async()
            .await;

        let segments = vec!["part one".to_string(), "part two".to_string()];
        broadcaster(&server)
            .deliver(
                "user-1",
                &segments,
                "conv-1",
                Some("¹ Source\nhttps://x.com/a"),
                None,
            )
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn first_failure_aborts_remaining_segments() {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("POST", "/bots/bot-1/users/user-1/send")
            .match_query(mockito::Matcher::Any)
            .with_status(500)
            .with_body("boom")
            .expect(1)
            .create_async()
            .await;

        let segments = vec!["one".to_string(), "two".to_string(), "three".to_string()];
        let error = broadcaster(&server)
            .deliver("user-1", &segments, "conv-1", None, None)
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            DeliveryError::Api { segment: 0, status: 500, .. }
        ));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn per_turn_block_overrides_the_default() {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("POST", "/bots/bot-1/users/user-1/send")
            .match_query(mockito::Matcher::UrlEncoded(
                "chatfuel_block_id".into(),
                "custom-block".into(),
            ))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let segments = vec!["hello".to_string()];
        broadcaster(&server)
            .deliver("user-1", &segments, "conv-1", None, Some("custom-block"))
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn user_ids_are_percent_encoded_in_the_path() {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("POST", "/bots/bot-1/users/user%2F1/send")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let segments = vec!["hello".to_string()];
        broadcaster(&server)
            .deliver("user/1", &segments, "conv-1", None, None)
            .await
            .unwrap();

        mock.assert_async().await;
    }
}
