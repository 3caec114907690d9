//! Telegram Bot API client
//!
//! Long-polls `getUpdates` and answers with `sendMessage`. Only the handful of
//! fields the bot needs are modelled.

use super::{ChatId, InboundEvent, Transport, TransportError};
use crate::config::TelegramConfig;
use crate::core::conversation::UserId;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const BASE_DELAY_MS: u64 = 1000;

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Serialize)]
struct GetUpdatesRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to_message_id: Option<i64>,
}

impl Update {
    /// Text messages with a known sender become events; everything else is skipped
    pub fn into_event(self) -> Option<InboundEvent> {
        let message = self.message?;
        let from = message.from?;
        let text = message.text?;
        let display_name = from.username.unwrap_or_else(|| from.id.to_string());

        Some(
            InboundEvent::new(UserId(from.id), display_name, ChatId(message.chat.id), text)
                .with_message_id(message.message_id),
        )
    }
}

pub struct TelegramClient {
    client: Client,
    base_url: String,
    poll_timeout_secs: u64,
    max_retries: u32,
}

impl TelegramClient {
    pub fn new(token: &str, config: &TelegramConfig) -> Result<Self, TransportError> {
        // Long polls hold the request open for up to poll_timeout_secs
        let client = Client::builder()
            .timeout(Duration::from_secs(
                config.request_timeout_secs + config.poll_timeout_secs,
            ))
            .build()?;

        Ok(Self {
            client,
            base_url: format!("{}/bot{}", config.api_base.trim_end_matches('/'), token),
            poll_timeout_secs: config.poll_timeout_secs,
            max_retries: config.max_retries.max(1),
        })
    }

    /// Fetch the next batch of events, advancing `offset` past every update seen
    pub async fn next_events(
        &self,
        offset: &mut Option<i64>,
    ) -> Result<Vec<InboundEvent>, TransportError> {
        let request = GetUpdatesRequest {
            offset: *offset,
            timeout: self.poll_timeout_secs,
            allowed_updates: &["message"],
        };
        let updates: Vec<Update> = self.call("getUpdates", &request).await?;

        if let Some(last) = updates.iter().map(|u| u.update_id).max() {
            *offset = Some(last + 1);
        }
        tracing::debug!("[TelegramClient] Received {} updates", updates.len());

        Ok(updates.into_iter().filter_map(Update::into_event).collect())
    }

    async fn call<P, R>(&self, method: &str, payload: &P) -> Result<R, TransportError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, method);
        let mut last_error = None;

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                let delay = BASE_DELAY_MS * 2_u64.pow(attempt - 1);
                tracing::warn!(
                    "[TelegramClient] Retrying {} (attempt {}/{}) after {}ms delay",
                    method,
                    attempt + 1,
                    self.max_retries,
                    delay
                );
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            let response = match self.client.post(&url).json(payload).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    tracing::warn!("[TelegramClient] {} request failed: {}", method, e);
                    last_error = Some(TransportError::Http(e));
                    continue;
                }
            };

            let status = response.status();
            if status.is_server_error() {
                tracing::warn!("[TelegramClient] {} returned status {}", method, status);
                last_error = Some(TransportError::Api {
                    code: i64::from(status.as_u16()),
                    description: status.to_string(),
                });
                continue;
            }

            let body: ApiResponse<R> = response
                .json()
                .await
                .map_err(|e| TransportError::Decode(e.to_string()))?;

            if !body.ok {
                return Err(TransportError::Api {
                    code: body.error_code.unwrap_or_else(|| i64::from(status.as_u16())),
                    description: body.description.unwrap_or_else(|| "unknown error".to_string()),
                });
            }

            return body
                .result
                .ok_or_else(|| TransportError::Decode(format!("{} response had no result", method)));
        }

        Err(last_error.unwrap_or_else(|| TransportError::Decode("all retry attempts failed".to_string())))
    }
}

#[async_trait]
impl Transport for TelegramClient {
    async fn send_text(
        &self,
        chat: ChatId,
        reply_to: Option<i64>,
        text: &str,
    ) -> Result<(), TransportError> {
        let request = SendMessageRequest {
            chat_id: chat.0,
            text,
            reply_to_message_id: reply_to,
        };
        let _: serde_json::Value = self.call("sendMessage", &request).await?;
        tracing::debug!("[TelegramClient] Sent {} chars to chat {}", text.len(), chat);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Command;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> TelegramClient {
        let config = TelegramConfig {
            api_base: server.uri(),
            poll_timeout_secs: 0,
            request_timeout_secs: 5,
            max_retries: 2,
        };
        TelegramClient::new("123:abc", &config).unwrap()
    }

    #[tokio::test]
    async fn test_next_events_maps_updates_and_advances_offset() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/bot123:abc/getUpdates"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": [
                    {
                        "update_id": 10,
                        "message": {
                            "message_id": 1,
                            "from": {"id": 42, "username": "alice"},
                            "chat": {"id": 42},
                            "text": "hello"
                        }
                    },
                    {
                        "update_id": 11,
                        "message": {
                            "message_id": 2,
                            "from": {"id": 7},
                            "chat": {"id": -100},
                            "text": "/clear@vito_bot"
                        }
                    },
                    {
                        "update_id": 12,
                        "message": {
                            "message_id": 3,
                            "from": {"id": 42, "username": "alice"},
                            "chat": {"id": 42}
                        }
                    },
                    {"update_id": 13}
                ]
            })))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let mut offset = None;
        let events = client.next_events(&mut offset).await.unwrap();

        assert_eq!(offset, Some(14));
        assert_eq!(events.len(), 2);

        assert_eq!(events[0].sender, UserId(42));
        assert_eq!(events[0].display_name, "alice");
        assert_eq!(events[0].text, "hello");
        assert_eq!(events[0].message_id, Some(1));
        assert_eq!(events[0].command, None);

        assert_eq!(events[1].display_name, "7");
        assert_eq!(events[1].chat, ChatId(-100));
        assert_eq!(events[1].command, Some(Command::Clear));
    }

    #[tokio::test]
    async fn test_next_events_sends_offset() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/bot123:abc/getUpdates"))
            .and(body_partial_json(json!({"offset": 5, "allowed_updates": ["message"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": []})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let mut offset = Some(5);
        let events = client.next_events(&mut offset).await.unwrap();

        assert!(events.is_empty());
        assert_eq!(offset, Some(5));
    }

    #[tokio::test]
    async fn test_send_text_replies_to_message() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .and(body_partial_json(json!({
                "chat_id": 42,
                "text": "hello",
                "reply_to_message_id": 9
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": {"message_id": 10}
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        client.send_text(ChatId(42), Some(9), "hello").await.unwrap();
    }

    #[tokio::test]
    async fn test_api_error_not_retried() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: chat not found"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let err = client.send_text(ChatId(1), None, "hi").await.unwrap_err();

        match err {
            TransportError::Api { code, description } => {
                assert_eq!(code, 400);
                assert!(description.contains("chat not found"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_server_error_retried() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .respond_with(ResponseTemplate::new(502))
            .expect(2)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let err = client.send_text(ChatId(1), None, "hi").await.unwrap_err();
        assert!(matches!(err, TransportError::Api { code: 502, .. }));
    }
}
