use crate::registry::SubscriberRegistry;

// ---

pub const HELP_TEXT: &str = "\
Welcome to the OrangeBox bot!

Here are the available commands:
/start - Start the bot and get a welcome message.
/help - Show this message.
/subscribe - Receive update messages from the bot.
/unsubscribe - Unsubscribe from update messages.
/warnings_on - Also receive warnings (low battery, high temperature, ...).
/warnings_off - Only receive critical messages.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Subscribe,
    Unsubscribe,
    WarningsOn,
    WarningsOff,
    Unknown,
}

impl Command {
    // ---
    /// Parse a chat message. Non-command text yields `None`.
    ///
    /// Accepts the `/cmd@BotName` form used in group chats.
    pub fn parse(text: &str) -> Option<Self> {
        // ---
        let word = text.split_whitespace().next()?.strip_prefix('/')?;
        let name = word.split('@').next().unwrap_or(word);

        Some(match name.to_ascii_lowercase().as_str() {
            "start" => Command::Start,
            "help" => Command::Help,
            "subscribe" => Command::Subscribe,
            "unsubscribe" => Command::Unsubscribe,
            "warnings_on" => Command::WarningsOn,
            "warnings_off" => Command::WarningsOff,
            _ => Command::Unknown,
        })
    }
}

/// Apply `command` for `chat_id` and build the reply text.
///
/// Persistence failures are reported back to the sender instead of being
/// swallowed.
pub async fn handle_command(registry: &SubscriberRegistry, chat_id: &str, command: Command) -> String {
    // ---
    let outcome = match command {
        Command::Start => {
            return format!(
                "{HELP_TEXT}\n\nFeel free to explore the bot's functionalities! \
                 If you have any questions, use the /help command."
            )
        }
        Command::Help | Command::Unknown => return HELP_TEXT.to_string(),
        Command::Subscribe => registry
            .set_subscribed(chat_id, true)
            .await
            .map(|changed| if changed { "Subscribed" } else { "Already subscribed" }),
        Command::Unsubscribe => registry
            .set_subscribed(chat_id, false)
            .await
            .map(|changed| if changed { "Unsubscribed" } else { "Not subscribed" }),
        Command::WarningsOn => registry.set_warnings(chat_id, true).await.map(|changed| {
            if changed {
                "Warnings enabled"
            } else {
                "Warnings already enabled"
            }
        }),
        Command::WarningsOff => registry.set_warnings(chat_id, false).await.map(|changed| {
            if changed {
                "Warnings disabled"
            } else {
                "Warnings already disabled"
            }
        }),
    };

    match outcome {
        Ok(reply) => {
            tracing::info!("{:?} from {}: {}", command, chat_id, reply);
            reply.to_string()
        }
        Err(e) => {
            tracing::error!("{:?} from {} failed: {}", command, chat_id, e);
            "Sorry, that did not work. Please try again later.".to_string()
        }
    }
}
