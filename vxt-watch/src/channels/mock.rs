//! In-memory chat platform used by unit tests.

use super::{ChatMessage, ChatPlatform, ControlButton, EmbedSnapshot};
use async_trait::async_trait;
use serenity::all::{ChannelId, MessageId, UserId};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

pub const BOT_ID: u64 = 9000;

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    pub content: String,
    pub buttons: Vec<ControlButton>,
}

#[derive(Default)]
struct State {
    messages: HashMap<MessageId, ChatMessage>,
    fetch_counts: HashMap<MessageId, usize>,
    /// Embeds that appear once a message has been fetched this many times
    late_embeds: HashMap<MessageId, (usize, Vec<EmbedSnapshot>)>,
    failing_fetches: HashSet<MessageId>,
    failing_deletes: HashSet<MessageId>,
    sent: Vec<SentMessage>,
    deleted: Vec<MessageId>,
    reactions: Vec<(MessageId, String)>,
    history_reads: usize,
}

pub struct MockPlatform {
    state: Mutex<State>,
    next_id: AtomicU64,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            next_id: AtomicU64::new(100_000),
        }
    }

    pub fn insert(&self, message: ChatMessage) {
        self.state.lock().unwrap().messages.insert(message.id, message);
    }

    /// Post a message as the bot, bypassing `send_message` bookkeeping
    pub fn insert_from_bot(&self, channel_id: ChannelId, content: &str) -> MessageId {
        let id = MessageId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.insert(message(id.get(), channel_id.get(), BOT_ID, content));
        id
    }

    pub fn embed_after_fetches(&self, message_id: MessageId, fetches: usize, embeds: Vec<EmbedSnapshot>) {
        self.state
            .lock()
            .unwrap()
            .late_embeds
            .insert(message_id, (fetches, embeds));
    }

    pub fn fail_fetch(&self, message_id: MessageId) {
        self.state.lock().unwrap().failing_fetches.insert(message_id);
    }

    pub fn fail_delete(&self, message_id: MessageId) {
        self.state.lock().unwrap().failing_deletes.insert(message_id);
    }

    /// Drop a message without recording a deletion, as if removed by someone else
    pub fn vanish(&self, message_id: MessageId) {
        self.state.lock().unwrap().messages.remove(&message_id);
    }

    pub fn fetch_count(&self, message_id: MessageId) -> usize {
        self.state
            .lock()
            .unwrap()
            .fetch_counts
            .get(&message_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn deleted(&self) -> Vec<MessageId> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub fn reactions(&self) -> Vec<(MessageId, String)> {
        self.state.lock().unwrap().reactions.clone()
    }

    pub fn history_reads(&self) -> usize {
        self.state.lock().unwrap().history_reads
    }

    /// Live messages in a channel authored by the bot with exactly this content
    pub fn live_bot_messages(&self, channel_id: ChannelId, content: &str) -> Vec<MessageId> {
        let state = self.state.lock().unwrap();
        let mut ids: Vec<MessageId> = state
            .messages
            .values()
            .filter(|m| {
                m.channel_id == channel_id
                    && m.author_id == UserId::new(BOT_ID)
                    && m.content == content
            })
            .map(|m| m.id)
            .collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl ChatPlatform for MockPlatform {
    fn bot_user_id(&self) -> UserId {
        UserId::new(BOT_ID)
    }

    async fn fetch_message(
        &self,
        _channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<ChatMessage, String> {
        let mut state = self.state.lock().unwrap();
        let count = {
            let count = state.fetch_counts.entry(message_id).or_insert(0);
            *count += 1;
            *count
        };

        if state.failing_fetches.contains(&message_id) {
            return Err(format!("fetch of {} failed", message_id));
        }

        let mut found = state
            .messages
            .get(&message_id)
            .cloned()
            .ok_or_else(|| format!("Unknown Message {}", message_id))?;

        if let Some((after, embeds)) = state.late_embeds.get(&message_id) {
            if count >= *after {
                found.embeds = embeds.clone();
            }
        }
        Ok(found)
    }

    async fn recent_messages(
        &self,
        channel_id: ChannelId,
        limit: u8,
    ) -> Result<Vec<ChatMessage>, String> {
        let mut state = self.state.lock().unwrap();
        state.history_reads += 1;
        let mut in_channel: Vec<ChatMessage> = state
            .messages
            .values()
            .filter(|m| m.channel_id == channel_id)
            .cloned()
            .collect();
        in_channel.sort_by(|a, b| b.id.cmp(&a.id));
        in_channel.truncate(limit as usize);
        Ok(in_channel)
    }

    async fn send_message(
        &self,
        channel_id: ChannelId,
        content: &str,
        buttons: &[ControlButton],
    ) -> Result<MessageId, String> {
        let id = MessageId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut state = self.state.lock().unwrap();
        state
            .messages
            .insert(id, message(id.get(), channel_id.get(), BOT_ID, content));
        state.sent.push(SentMessage {
            channel_id,
            message_id: id,
            content: content.to_string(),
            buttons: buttons.to_vec(),
        });
        Ok(id)
    }

    async fn delete_message(
        &self,
        _channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<(), String> {
        let mut state = self.state.lock().unwrap();
        if state.failing_deletes.contains(&message_id) {
            return Err(format!("delete of {} failed", message_id));
        }
        if state.messages.remove(&message_id).is_none() {
            return Err(format!("Unknown Message {}", message_id));
        }
        state.deleted.push(message_id);
        Ok(())
    }

    async fn react(
        &self,
        _channel_id: ChannelId,
        message_id: MessageId,
        reaction: &str,
    ) -> Result<(), String> {
        self.state
            .lock()
            .unwrap()
            .reactions
            .push((message_id, reaction.to_string()));
        Ok(())
    }
}

/// Wraps [`MockPlatform`] and yields to the scheduler before every call, so
/// concurrently spawned tasks interleave at each network round trip.
pub struct YieldingPlatform(pub MockPlatform);

#[async_trait]
impl ChatPlatform for YieldingPlatform {
    fn bot_user_id(&self) -> UserId {
        self.0.bot_user_id()
    }

    async fn fetch_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<ChatMessage, String> {
        tokio::task::yield_now().await;
        self.0.fetch_message(channel_id, message_id).await
    }

    async fn recent_messages(
        &self,
        channel_id: ChannelId,
        limit: u8,
    ) -> Result<Vec<ChatMessage>, String> {
        tokio::task::yield_now().await;
        self.0.recent_messages(channel_id, limit).await
    }

    async fn send_message(
        &self,
        channel_id: ChannelId,
        content: &str,
        buttons: &[ControlButton],
    ) -> Result<MessageId, String> {
        tokio::task::yield_now().await;
        self.0.send_message(channel_id, content, buttons).await
    }

    async fn delete_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<(), String> {
        tokio::task::yield_now().await;
        self.0.delete_message(channel_id, message_id).await
    }

    async fn react(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        reaction: &str,
    ) -> Result<(), String> {
        tokio::task::yield_now().await;
        self.0.react(channel_id, message_id, reaction).await
    }
}

/// Build a plain message with no embeds and no reply reference
pub fn message(id: u64, channel_id: u64, author_id: u64, content: &str) -> ChatMessage {
    ChatMessage {
        id: MessageId::new(id),
        channel_id: ChannelId::new(channel_id),
        guild_id: None,
        author_id: UserId::new(author_id),
        content: content.to_string(),
        embeds: vec![],
        reference: None,
    }
}
