pub mod discord;
pub mod types;

#[cfg(test)]
pub mod mock;

pub use discord::{start_discord_listener, DiscordPlatform};
pub use types::{channel_link, ChatMessage, ControlButton, EmbedSnapshot};

use async_trait::async_trait;
use serenity::all::{ChannelId, MessageId, UserId};

/// The chat operations the retweet detector and status controls depend on.
///
/// Every call is a network operation on the real platform and may fail;
/// failures are reported as plain strings and never retried here.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// User ID of the bot itself
    fn bot_user_id(&self) -> UserId;

    async fn fetch_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<ChatMessage, String>;

    /// Most recent messages of a channel, newest first
    async fn recent_messages(
        &self,
        channel_id: ChannelId,
        limit: u8,
    ) -> Result<Vec<ChatMessage>, String>;

    async fn send_message(
        &self,
        channel_id: ChannelId,
        content: &str,
        buttons: &[ControlButton],
    ) -> Result<MessageId, String>;

    async fn delete_message(&self, channel_id: ChannelId, message_id: MessageId)
        -> Result<(), String>;

    /// Add a reaction; `reaction` is a unicode emoji or a custom emoji in `<:name:id>` form
    async fn react(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        reaction: &str,
    ) -> Result<(), String>;
}
