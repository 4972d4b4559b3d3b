use crate::http::build_client;
use reqwest::Client;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_with::skip_serializing_none;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("{method} request failed: {message}")]
    Request { method: &'static str, message: String },
    #[error("{method} rejected by telegram: {description}")]
    Api {
        method: &'static str,
        description: String,
    },
    #[error("{method} returned an invalid response: {message}")]
    Decode { method: &'static str, message: String },
}

#[derive(Debug, Clone, Copy, Serialize)]
pub enum ParseMode {
    Markdown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SentMessage {
    pub message_id: i64,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[skip_serializing_none]
#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: Option<ParseMode>,
}

#[skip_serializing_none]
#[derive(Debug, Serialize)]
struct SendPhotoRequest<'a> {
    chat_id: i64,
    photo: &'a str,
    caption: Option<&'a str>,
    parse_mode: Option<ParseMode>,
}

#[skip_serializing_none]
#[derive(Debug, Serialize)]
struct EditMessageTextRequest<'a> {
    chat_id: i64,
    message_id: i64,
    text: &'a str,
    parse_mode: Option<ParseMode>,
}

#[derive(Debug, Serialize)]
struct DeleteMessageRequest {
    chat_id: i64,
    message_id: i64,
}

#[skip_serializing_none]
#[derive(Debug, Serialize)]
struct SetWebhookRequest<'a> {
    url: &'a str,
    secret_token: Option<&'a str>,
    allowed_updates: &'a [&'a str],
}

/// Thin Bot API client. Cheap to clone; the connection pool is shared.
#[derive(Debug, Clone)]
pub struct TelegramClient {
    http: Client,
    api_root: String,
    token: String,
}

impl TelegramClient {
    pub fn new(api_root: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http: build_client(timeout),
            api_root: api_root.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_root, self.token)
    }

    async fn call<B, T>(&self, method: &'static str, body: &B) -> Result<T, TelegramError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .http
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(|err| TelegramError::Request {
                method,
                // reqwest errors embed the URL, which carries the token.
                message: err.without_url().to_string(),
            })?;
        let status = response.status();
        let envelope: Envelope<T> = response.json().await.map_err(|err| TelegramError::Decode {
            method,
            message: format!("HTTP {status}: {}", err.without_url()),
        })?;
        if !envelope.ok {
            return Err(TelegramError::Api {
                method,
                description: envelope
                    .description
                    .unwrap_or_else(|| format!("HTTP {status}")),
            });
        }
        debug!(target = "affilink.telegram", method, "bot api call ok");
        envelope.result.ok_or_else(|| TelegramError::Decode {
            method,
            message: "missing result".into(),
        })
    }

    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        parse_mode: Option<ParseMode>,
    ) -> Result<SentMessage, TelegramError> {
        self.call(
            "sendMessage",
            &SendMessageRequest {
                chat_id,
                text,
                parse_mode,
            },
        )
        .await
    }

    /// Sends a photo by URL; Telegram downloads it server-side.
    pub async fn send_photo(
        &self,
        chat_id: i64,
        photo_url: &str,
        caption: Option<&str>,
        parse_mode: Option<ParseMode>,
    ) -> Result<SentMessage, TelegramError> {
        self.call(
            "sendPhoto",
            &SendPhotoRequest {
                chat_id,
                photo: photo_url,
                caption,
                parse_mode,
            },
        )
        .await
    }

    pub async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        parse_mode: Option<ParseMode>,
    ) -> Result<(), TelegramError> {
        // editMessageText answers with the Message object (or `true` for inline messages).
        let _: serde_json::Value = self
            .call(
                "editMessageText",
                &EditMessageTextRequest {
                    chat_id,
                    message_id,
                    text,
                    parse_mode,
                },
            )
            .await?;
        Ok(())
    }

    pub async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), TelegramError> {
        let _: bool = self
            .call(
                "deleteMessage",
                &DeleteMessageRequest {
                    chat_id,
                    message_id,
                },
            )
            .await?;
        Ok(())
    }

    pub async fn set_webhook(
        &self,
        url: &str,
        secret_token: Option<&str>,
    ) -> Result<(), TelegramError> {
        let _: bool = self
            .call(
                "setWebhook",
                &SetWebhookRequest {
                    url,
                    secret_token,
                    allowed_updates: &["message"],
                },
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> TelegramClient {
        TelegramClient::new(server.uri(), "123:abc", Duration::from_secs(5))
    }

    #[tokio::test]
    async fn send_message_returns_message_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .and(body_json(json!({"chat_id": 42, "text": "hello"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"ok": true, "result": {"message_id": 77}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let sent = client(&server)
            .send_message(42, "hello", None)
            .await
            .expect("sent");
        assert_eq!(sent.message_id, 77);
    }

    #[tokio::test]
    async fn api_rejection_carries_description() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendPhoto"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: wrong file identifier/HTTP URL specified"
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .send_photo(42, "https://example.com/x.jpg", Some("cap"), Some(ParseMode::Markdown))
            .await
            .expect_err("rejected");
        match err {
            TelegramError::Api {
                method,
                description,
            } => {
                assert_eq!(method, "sendPhoto");
                assert!(description.contains("wrong file identifier"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn set_webhook_sends_secret_when_present() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/setWebhook"))
            .and(body_json(json!({
                "url": "https://bot.example.com/webhook",
                "secret_token": "s3cret",
                "allowed_updates": ["message"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": true})))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .set_webhook("https://bot.example.com/webhook", Some("s3cret"))
            .await
            .expect("webhook set");
    }

    #[tokio::test]
    async fn edit_and_delete_succeed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/editMessageText"))
            .and(body_json(json!({
                "chat_id": 1, "message_id": 2, "text": "done", "parse_mode": "Markdown"
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"ok": true, "result": {"message_id": 2}})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/deleteMessage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        client
            .edit_message_text(1, 2, "done", Some(ParseMode::Markdown))
            .await
            .expect("edited");
        client.delete_message(1, 2).await.expect("deleted");
    }
}
