//! Minimal Telegram Bot API client: `sendMessage` for delivery and
//! `getUpdates` long polling for inbound subscriber commands.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{Inbox, IncomingMessage, Notifier};
use crate::error::NotifyError;

// ---

#[derive(Debug, Clone)]
pub struct TelegramBot {
    // ---
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

impl TelegramBot {
    // ---
    /// `api_url` is the API root, e.g. `https://api.telegram.org`.
    pub fn new(api_url: &str, token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
        }
    }

    /// Long-poll for updates newer than `offset`.
    ///
    /// Returns the next offset to ask for together with the text messages
    /// received. Updates without text are skipped but still acknowledged.
    pub async fn get_updates(
        &self,
        offset: i64,
        timeout: Duration,
    ) -> Result<(i64, Vec<IncomingMessage>), NotifyError> {
        // ---
        let url = format!("{}/getUpdates", self.base_url);
        let response: ApiResponse<Vec<Update>> = self
            .client
            .get(&url)
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", timeout.as_secs().to_string()),
            ])
            .timeout(timeout + Duration::from_secs(10))
            .send()
            .await?
            .json()
            .await?;

        let updates = into_result(response)?;
        let next_offset = updates
            .iter()
            .map(|u| u.update_id + 1)
            .max()
            .unwrap_or(offset);

        let messages = updates
            .into_iter()
            .filter_map(|u| u.message)
            .filter_map(|m| {
                m.text.map(|text| IncomingMessage {
                    chat_id: m.chat.id.to_string(),
                    text,
                })
            })
            .collect();

        Ok((next_offset, messages))
    }
}

fn into_result<T>(response: ApiResponse<T>) -> Result<T, NotifyError> {
    // ---
    match (response.ok, response.result) {
        (true, Some(result)) => Ok(result),
        _ => Err(NotifyError::Api(
            response
                .description
                .unwrap_or_else(|| "no description".to_string()),
        )),
    }
}

#[async_trait]
impl Inbox for TelegramBot {
    async fn poll(
        &self,
        offset: i64,
        timeout: Duration,
    ) -> Result<(i64, Vec<IncomingMessage>), NotifyError> {
        self.get_updates(offset, timeout).await
    }
}

#[async_trait]
impl Notifier for TelegramBot {
    async fn send(&self, chat_id: &str, text: &str) -> Result<(), NotifyError> {
        // ---
        let url = format!("{}/sendMessage", self.base_url);
        let response: ApiResponse<serde_json::Value> = self
            .client
            .post(&url)
            .json(&SendMessage { chat_id, text })
            .send()
            .await?
            .json()
            .await?;

        into_result(response).map(|_| ())
    }
}
