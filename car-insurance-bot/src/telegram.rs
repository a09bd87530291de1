//! Telegram Bot API transport: long-polling, update conversion and the
//! outbound calls the intake flow needs.

use intake_flow::{ChatId, InboundEvent, Keyboard};
use reqwest::{StatusCode, multipart};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
const LONG_POLL_SECS: &str = "30";
const WANTED_UPDATES: &str = r#"["message","callback_query"]"#;
const REJECTED_POLL_PAUSE: Duration = Duration::from_secs(10);
const RETRY_BASE_DELAY: Duration = Duration::from_millis(250);
const RETRY_MAX_DELAY: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum TelegramError {
    #[error("telegram request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("telegram {method} failed: status={status} description={description}")]
    Api {
        method: String,
        status: u16,
        description: String,
    },

    #[error("telegram file {0} has no download path")]
    MissingFilePath(String),

    #[error("failed to read upload: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    bot_token: String,
    api_base: String,
}

impl TelegramClient {
    pub fn new(bot_token: &str) -> Result<Self, TelegramError> {
        Self::with_api_base(bot_token, TELEGRAM_API_BASE)
    }

    pub fn with_api_base(bot_token: &str, api_base: &str) -> Result<Self, TelegramError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            http,
            bot_token: bot_token.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.bot_token, method)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.api_base, self.bot_token, file_path)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &Value,
    ) -> Result<T, TelegramError> {
        let response = self.http.post(self.api_url(method)).json(body).send().await?;
        Self::read_result(method, response).await
    }

    async fn read_result<T: DeserializeOwned>(
        method: &str,
        response: reqwest::Response,
    ) -> Result<T, TelegramError> {
        let status = response.status();
        let parsed: TelegramResponse<T> = response.json().await?;
        match parsed.result {
            Some(result) if parsed.ok => Ok(result),
            _ => Err(TelegramError::Api {
                method: method.to_string(),
                status: status.as_u16(),
                description: parsed
                    .description
                    .unwrap_or_else(|| "no description".to_string()),
            }),
        }
    }

    pub async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<(), TelegramError> {
        let mut body = json!({
            "chat_id": chat_id.0,
            "text": text,
        });
        if let Some(keyboard) = keyboard {
            body["reply_markup"] = reply_markup(keyboard);
        }
        self.call::<Value>("sendMessage", &body).await?;
        Ok(())
    }

    pub async fn send_document(
        &self,
        chat_id: ChatId,
        path: &Path,
        caption: &str,
    ) -> Result<(), TelegramError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());

        let form = multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .part("document", multipart::Part::bytes(bytes).file_name(file_name));

        let response = self
            .http
            .post(self.api_url("sendDocument"))
            .multipart(form)
            .send()
            .await?;
        Self::read_result::<Value>("sendDocument", response).await?;
        Ok(())
    }

    pub async fn answer_callback_query(
        &self,
        callback_query_id: &str,
    ) -> Result<(), TelegramError> {
        self.call::<Value>(
            "answerCallbackQuery",
            &json!({ "callback_query_id": callback_query_id }),
        )
        .await?;
        Ok(())
    }

    /// Download an uploaded file; returns its bytes and Telegram-side path
    pub async fn download_file(&self, file_id: &str) -> Result<(Vec<u8>, String), TelegramError> {
        let file: TelegramFile = self.call("getFile", &json!({ "file_id": file_id })).await?;
        let file_path = file
            .file_path
            .ok_or_else(|| TelegramError::MissingFilePath(file_id.to_string()))?;

        let response = self.http.get(self.file_url(&file_path)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TelegramError::Api {
                method: "downloadFile".to_string(),
                status: status.as_u16(),
                description: response.text().await.unwrap_or_default(),
            });
        }
        let bytes = response.bytes().await?;
        Ok((bytes.to_vec(), file_path))
    }

    /// Polling and webhooks are mutually exclusive on Telegram's side
    pub async fn delete_webhook(&self) -> Result<(), TelegramError> {
        self.call::<Value>("deleteWebhook", &json!({ "drop_pending_updates": true }))
            .await?;
        Ok(())
    }

    async fn fetch_updates(&self, offset: i64) -> Result<Vec<TelegramUpdate>, PollFailure> {
        let offset = offset.to_string();
        let response = self
            .http
            .get(self.api_url("getUpdates"))
            .query(&[
                ("timeout", LONG_POLL_SECS),
                ("offset", offset.as_str()),
                ("allowed_updates", WANTED_UPDATES),
            ])
            .send()
            .await
            .map_err(|e| PollFailure::Retry(format!("request error: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = format!("status {status}: {body}");
            return Err(if worth_retrying(status) {
                PollFailure::Retry(reason)
            } else {
                PollFailure::Rejected(reason)
            });
        }

        let parsed: TelegramResponse<Vec<TelegramUpdate>> = response
            .json()
            .await
            .map_err(|e| PollFailure::Retry(format!("unreadable updates: {e}")))?;
        Ok(parsed.result.unwrap_or_default())
    }

    /// Long-poll `getUpdates` and forward every convertible update to `tx`.
    ///
    /// Only returns when the receiving side is gone.
    #[tracing::instrument(level = "info", skip_all)]
    pub async fn run_poll_loop(&self, tx: mpsc::Sender<InboundEvent>) -> anyhow::Result<()> {
        let mut offset: i64 = 0;
        let mut backoff = Backoff::default();

        loop {
            let mut updates = match self.fetch_updates(offset).await {
                Ok(updates) => {
                    backoff.reset();
                    updates
                }
                Err(PollFailure::Retry(reason)) => {
                    let delay = backoff.next_delay();
                    tracing::warn!(%reason, ?delay, "polling for updates failed, backing off");
                    tokio::time::sleep(delay).await;
                    continue;
                }
                Err(PollFailure::Rejected(reason)) => {
                    backoff.reset();
                    tracing::error!(
                        %reason,
                        pause = ?REJECTED_POLL_PAUSE,
                        "Telegram rejected getUpdates; check the bot token"
                    );
                    tokio::time::sleep(REJECTED_POLL_PAUSE).await;
                    continue;
                }
            };

            updates.sort_by_key(|update| update.update_id);
            for update in updates {
                if update.update_id < offset {
                    continue;
                }
                // Confirm the update even if it does not convert, so it is never redelivered.
                offset = update.update_id.saturating_add(1);

                let Some(event) = inbound_event(&update) else {
                    tracing::debug!(update_id = update.update_id, "skipping unsupported update");
                    continue;
                };
                if tx.send(event).await.is_err() {
                    anyhow::bail!("dispatcher stopped accepting events");
                }
            }
        }
    }
}

enum PollFailure {
    /// Network trouble, throttling or a server-side error
    Retry(String),
    /// Telegram refused the call, typically a revoked token
    Rejected(String),
}

/// Doubling delay between failed polls, capped
#[derive(Debug, Default)]
struct Backoff {
    failures: u32,
}

impl Backoff {
    fn next_delay(&mut self) -> Duration {
        let delay = RETRY_BASE_DELAY
            .saturating_mul(1 << self.failures.min(10))
            .min(RETRY_MAX_DELAY);
        self.failures = self.failures.saturating_add(1);
        delay
    }

    fn reset(&mut self) {
        self.failures = 0;
    }
}

fn worth_retrying(status: StatusCode) -> bool {
    status.is_server_error()
        || matches!(
            status,
            StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT
        )
}

/// Inline keyboard markup, all buttons on one row
pub fn reply_markup(keyboard: Keyboard) -> Value {
    let row: Vec<Value> = keyboard
        .buttons()
        .into_iter()
        .map(|button| json!({ "text": button.label, "callback_data": button.callback_data }))
        .collect();
    json!({ "inline_keyboard": [row] })
}

/// Map an update onto the intake flow's events; anything else is ignored
pub fn inbound_event(update: &TelegramUpdate) -> Option<InboundEvent> {
    if let Some(query) = &update.callback_query {
        let chat = query.message.as_ref()?.chat.id;
        let data = query.data.as_deref().unwrap_or_default();
        return Some(InboundEvent::button(ChatId(chat), data).with_interaction(query.id.clone()));
    }

    let message = update.message.as_ref()?;
    let chat = ChatId(message.chat.id);
    if let Some(document) = &message.document {
        return Some(InboundEvent::upload(chat, document.file_id.as_str()));
    }
    if let Some(photo) = message
        .photo
        .iter()
        .max_by_key(|size| u64::from(size.width) * u64::from(size.height))
    {
        return Some(InboundEvent::upload(chat, photo.file_id.as_str()));
    }
    message
        .text
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| InboundEvent::text(chat, text))
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct TelegramResponse<T> {
    ok: bool,
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramFile {
    #[serde(default)]
    file_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<TelegramMessage>,
    #[serde(default)]
    pub callback_query: Option<TelegramCallbackQuery>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelegramMessage {
    #[serde(default)]
    pub message_id: Option<i64>,
    pub chat: TelegramChat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub document: Option<TelegramDocument>,
    #[serde(default)]
    pub photo: Vec<TelegramPhotoSize>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelegramChat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelegramDocument {
    pub file_id: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelegramPhotoSize {
    pub file_id: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelegramCallbackQuery {
    pub id: String,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub message: Option<TelegramMessage>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_flow::{Button, DocumentKind, EventKind, FileRef};

    fn update(value: Value) -> TelegramUpdate {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn backoff_doubles_caps_and_resets() {
        let mut backoff = Backoff::default();
        let delays: Vec<u128> = (0..4).map(|_| backoff.next_delay().as_millis()).collect();
        assert_eq!(delays, vec![250, 500, 1000, 2000]);

        for _ in 0..20 {
            backoff.next_delay();
        }
        assert_eq!(backoff.next_delay(), RETRY_MAX_DELAY);

        backoff.reset();
        assert_eq!(backoff.next_delay().as_millis(), 250);
    }

    #[test]
    fn only_throttling_and_server_errors_are_retried() {
        assert!(worth_retrying(StatusCode::TOO_MANY_REQUESTS));
        assert!(worth_retrying(StatusCode::BAD_GATEWAY));
        assert!(!worth_retrying(StatusCode::UNAUTHORIZED));
        assert!(!worth_retrying(StatusCode::CONFLICT));
    }

    #[test]
    fn start_command_and_free_text() {
        let event = inbound_event(&update(json!({
            "update_id": 1,
            "message": { "message_id": 5, "chat": { "id": 77 }, "text": "/start" }
        })))
        .unwrap();
        assert_eq!(event.chat_id, ChatId(77));
        assert_eq!(event.kind, EventKind::Start);

        let event = inbound_event(&update(json!({
            "update_id": 2,
            "message": { "chat": { "id": 77 }, "text": "what does it cover?" }
        })))
        .unwrap();
        assert_eq!(event.kind, EventKind::Text("what does it cover?".to_string()));
    }

    #[test]
    fn document_and_largest_photo_become_uploads() {
        let event = inbound_event(&update(json!({
            "update_id": 3,
            "message": {
                "chat": { "id": 9 },
                "document": { "file_id": "doc-1", "file_name": "passport.pdf" }
            }
        })))
        .unwrap();
        assert_eq!(event.kind, EventKind::Upload(FileRef::new("doc-1")));

        let event = inbound_event(&update(json!({
            "update_id": 4,
            "message": {
                "chat": { "id": 9 },
                "photo": [
                    { "file_id": "small", "width": 90, "height": 60 },
                    { "file_id": "large", "width": 1280, "height": 960 },
                    { "file_id": "medium", "width": 320, "height": 240 }
                ]
            }
        })))
        .unwrap();
        assert_eq!(event.kind, EventKind::Upload(FileRef::new("large")));
    }

    #[test]
    fn callback_query_carries_interaction_id() {
        let event = inbound_event(&update(json!({
            "update_id": 5,
            "callback_query": {
                "id": "cbq-1",
                "data": "Vehicle identification document",
                "message": { "chat": { "id": 12 } }
            }
        })))
        .unwrap();
        assert_eq!(event.chat_id, ChatId(12));
        assert_eq!(
            event.kind,
            EventKind::Button(Button::Select(DocumentKind::VehicleDocument))
        );
        assert_eq!(event.interaction_id.as_deref(), Some("cbq-1"));
    }

    #[test]
    fn unsupported_updates_are_ignored() {
        assert!(inbound_event(&update(json!({ "update_id": 6 }))).is_none());
        assert!(
            inbound_event(&update(json!({
                "update_id": 7,
                "message": { "chat": { "id": 1 }, "text": "   " }
            })))
            .is_none()
        );
    }

    #[test]
    fn keyboard_markup_is_a_single_row() {
        assert_eq!(
            reply_markup(Keyboard::PriceConfirmation),
            json!({
                "inline_keyboard": [[
                    { "text": "Yes", "callback_data": "YesPrice" },
                    { "text": "No", "callback_data": "NoPrice" }
                ]]
            })
        );
    }
}
