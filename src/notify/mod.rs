//! Notification side: delivery channel, alert fan-out and subscriber
//! commands.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::NotifyError;

mod broadcaster;
mod commands;
mod telegram;

pub use broadcaster::AlertBroadcaster;
pub use commands::{handle_command, Command, HELP_TEXT};
pub use telegram::TelegramBot;

// ---

/// A chat message addressed to the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub chat_id: String,
    pub text: String,
}

/// Outbound notification channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, chat_id: &str, text: &str) -> Result<(), NotifyError>;
}

/// Inbound side of the chat channel.
#[async_trait]
pub trait Inbox: Send + Sync {
    /// Wait up to `timeout` for messages newer than `offset`; returns the
    /// offset to continue from.
    async fn poll(
        &self,
        offset: i64,
        timeout: Duration,
    ) -> Result<(i64, Vec<IncomingMessage>), NotifyError>;

    /// Acknowledge whatever queued up while nobody was polling and return
    /// the offset that follows it.
    ///
    /// An offset of -1 asks for the newest update only; continuing past it
    /// confirms the whole backlog without handling it.
    async fn skip_pending(&self) -> Result<i64, NotifyError> {
        // ---
        let (next, skipped) = self.poll(-1, Duration::ZERO).await?;
        if !skipped.is_empty() {
            tracing::info!("Discarded chat commands queued while the notifier was down");
        }
        Ok(next.max(0))
    }
}
