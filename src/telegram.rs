//! Minimal Telegram Bot API client and the long-polling loop.
//!
//! Only the handful of methods the bot needs are wrapped: `getUpdates`,
//! `sendMessage`, `editMessageText`, and `answerCallbackQuery`. All text is
//! sent with HTML parse mode; [`Markup`] values are serialized to the wire
//! keyboard shapes here so the rest of the crate never sees Telegram JSON.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;

use crate::dispatch::Engine;
use crate::render::{Markup, Render};

const API_BASE: &str = "https://api.telegram.org";

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    description: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct User {
    pub id: i64,
    pub first_name: String,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub message: Option<Message>,
    pub data: Option<String>,
}

// ── Client ────────────────────────────────────────────────────────────────────

/// A thin client over the Bot API, plus the polling loop that feeds turns
/// into the [`Engine`].
pub struct Bot {
    http: reqwest::Client,
    base_url: String,
    engine: Arc<Engine>,
    poll_timeout_secs: u64,
}

impl Bot {
    pub fn new(token: &str, engine: Arc<Engine>, poll_timeout_secs: u64) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: format!("{API_BASE}/bot{token}"),
            engine,
            poll_timeout_secs,
        }
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T> {
        let url = format!("{}/{method}", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("HTTP request failed for {method}"))?;

        let parsed: ApiResponse<T> = response
            .json()
            .await
            .with_context(|| format!("malformed response from {method}"))?;

        anyhow::ensure!(
            parsed.ok,
            "{method} rejected: {}",
            parsed.description.as_deref().unwrap_or("no description")
        );
        parsed
            .result
            .with_context(|| format!("{method} returned ok without a result"))
    }

    async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        self.call(
            "getUpdates",
            json!({
                "offset": offset,
                "timeout": self.poll_timeout_secs,
                "allowed_updates": ["message", "callback_query"],
            }),
        )
        .await
    }

    async fn send_message(&self, chat_id: i64, text: &str, markup: Option<&Markup>) -> Result<()> {
        let mut body = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "HTML",
        });
        if let Some(reply_markup) = markup.and_then(markup_json) {
            body["reply_markup"] = reply_markup;
        }
        let _: Message = self.call("sendMessage", body).await?;
        Ok(())
    }

    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        markup: Option<&Markup>,
    ) -> Result<()> {
        let mut body = json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": text,
            "parse_mode": "HTML",
        });
        if let Some(reply_markup) = markup.and_then(markup_json) {
            body["reply_markup"] = reply_markup;
        }
        let _: serde_json::Value = self.call("editMessageText", body).await?;
        Ok(())
    }

    async fn answer_callback_query(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<()> {
        let mut body = json!({ "callback_query_id": callback_id });
        if let Some(text) = text {
            body["text"] = json!(text);
            body["show_alert"] = json!(show_alert);
        }
        let _: serde_json::Value = self.call("answerCallbackQuery", body).await?;
        Ok(())
    }

    // ── Polling loop ──────────────────────────────────────────────────────────

    /// Long-poll for updates until the task is cancelled. Updates are handled
    /// sequentially, which serializes turns per user.
    pub async fn run(&self) -> Result<()> {
        tracing::info!("long-polling loop started");
        let mut offset = 0;

        loop {
            let updates = match self.get_updates(offset).await {
                Ok(updates) => updates,
                Err(err) => {
                    tracing::warn!(error = %err, "getUpdates failed, backing off");
                    tokio::time::sleep(Duration::from_secs(3)).await;
                    continue;
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);
                if let Err(err) = self.handle_update(update).await {
                    tracing::error!(error = %err, "failed to handle update");
                }
            }
        }
    }

    async fn handle_update(&self, update: Update) -> Result<()> {
        if let Some(message) = update.message {
            let (Some(from), Some(text)) = (message.from, message.text) else {
                return Ok(());
            };
            let engine = Arc::clone(&self.engine);
            let render = tokio::task::spawn_blocking(move || {
                engine.handle_message(from.id, &from.first_name, &text)
            })
            .await
            .context("message turn panicked")?;
            self.deliver(message.chat.id, None, None, render).await?;
        } else if let Some(callback) = update.callback_query {
            let Some(data) = callback.data else {
                self.answer_callback_query(&callback.id, None, false).await?;
                return Ok(());
            };
            let from_id = callback.from.id;
            let engine = Arc::clone(&self.engine);
            let render =
                tokio::task::spawn_blocking(move || engine.handle_callback(from_id, &data))
                    .await
                    .context("callback turn panicked")?;

            let source = callback
                .message
                .as_ref()
                .map(|m| (m.chat.id, m.message_id));
            let chat_id = source.map(|(chat, _)| chat).unwrap_or(from_id);
            self.deliver(chat_id, source, Some(&callback.id), render)
                .await?;
        }
        Ok(())
    }

    /// Map one [`Render`] onto Bot API calls. Callback turns are always
    /// acknowledged, alert or not, so the client stops its spinner.
    async fn deliver(
        &self,
        chat_id: i64,
        source: Option<(i64, i64)>,
        callback_id: Option<&str>,
        render: Render,
    ) -> Result<()> {
        match &render {
            Render::Alert { text } => {
                if let Some(id) = callback_id {
                    self.answer_callback_query(id, Some(text.as_str()), true)
                        .await?;
                } else {
                    self.send_message(chat_id, text, None).await?;
                }
                return Ok(());
            }
            Render::Edit { text, markup } => {
                if let Some(id) = callback_id {
                    self.answer_callback_query(id, None, false).await?;
                }
                // Without a source message there is nothing to edit.
                match source {
                    Some((chat, message_id)) => {
                        self.edit_message_text(chat, message_id, text, Some(markup))
                            .await?
                    }
                    None => self.send_message(chat_id, text, Some(markup)).await?,
                }
            }
            Render::Message { text, markup } => {
                if let Some(id) = callback_id {
                    self.answer_callback_query(id, None, false).await?;
                }
                self.send_message(chat_id, text, Some(markup)).await?;
            }
        }
        Ok(())
    }
}

/// Serialize a [`Markup`] into the Bot API `reply_markup` object, or `None`
/// for [`Markup::None`].
fn markup_json(markup: &Markup) -> Option<serde_json::Value> {
    match markup {
        Markup::None => None,
        Markup::Inline(rows) => {
            let rows: Vec<Vec<serde_json::Value>> = rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|b| json!({ "text": b.label, "callback_data": b.token }))
                        .collect()
                })
                .collect();
            Some(json!({ "inline_keyboard": rows }))
        }
        Markup::Reply(rows) => Some(json!({
            "keyboard": rows
                .iter()
                .map(|row| row.iter().map(|label| json!({ "text": label })).collect())
                .collect::<Vec<Vec<serde_json::Value>>>(),
            "resize_keyboard": true,
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::main_keyboard;

    #[test]
    fn reply_markup_carries_labels() {
        let value = markup_json(&main_keyboard()).unwrap();
        let rows = value["keyboard"].as_array().unwrap();
        assert_eq!(rows[0][0]["text"], "✍️ Record");
        assert_eq!(value["resize_keyboard"], true);
    }

    #[test]
    fn none_markup_is_omitted() {
        assert!(markup_json(&Markup::None).is_none());
    }

    #[test]
    fn update_with_callback_decodes() {
        let raw = r#"{
            "update_id": 42,
            "callback_query": {
                "id": "abc",
                "from": {"id": 7, "first_name": "Mara"},
                "message": {"message_id": 9, "chat": {"id": 7}, "text": "Pick an entry:"},
                "data": "view_ctx_7_0"
            }
        }"#;
        let update: Update = serde_json::from_str(raw).unwrap();
        assert_eq!(update.update_id, 42);
        let cb = update.callback_query.unwrap();
        assert_eq!(cb.from.id, 7);
        assert_eq!(cb.data.as_deref(), Some("view_ctx_7_0"));
    }
}
