//! Status buttons kept as the last message of each tracked thread.

use super::{control_id, ThreadStatus};
use crate::channels::{ChatPlatform, ControlButton};
use dashmap::DashMap;
use serenity::all::{ChannelId, MessageId};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Text of every status control message; also used to find them again after a restart
pub const STATUS_BUTTON_CONTENT: &str = "Thread status controls:";

/// How far back to look for a control message we lost track of
const RECOVERY_SCAN_LIMIT: u8 = 20;

/// Buttons for every status reachable from `current`
pub fn status_buttons(current: ThreadStatus) -> Vec<ControlButton> {
    current
        .transitions()
        .iter()
        .map(|next| ControlButton {
            custom_id: control_id(*next),
            label: next.label().to_string(),
        })
        .collect()
}

/// Tracks the live control message of each thread.
///
/// Lives for the whole process and is lost on restart; stale control messages
/// left by a previous run are found again by content.
#[derive(Default)]
pub struct StatusControls {
    /// thread id -> control message id
    messages: DashMap<ChannelId, MessageId>,
    /// Serializes replacement per thread, so concurrent events for the same
    /// thread cannot leave two control messages behind. Entries exist only
    /// while a replacement is running or waiting.
    locks: DashMap<ChannelId, Arc<Mutex<()>>>,
}

impl StatusControls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tracked(&self, thread_id: ChannelId) -> Option<MessageId> {
        self.messages.get(&thread_id).map(|entry| *entry.value())
    }

    pub fn tracked_count(&self) -> usize {
        self.messages.len()
    }

    /// Replace the thread's control message with a fresh one at the bottom of the thread
    pub async fn ensure_at_bottom(
        &self,
        platform: &dyn ChatPlatform,
        thread_id: ChannelId,
        status: ThreadStatus,
    ) -> Result<MessageId, String> {
        let lock = self.locks.entry(thread_id).or_default().clone();
        let result = {
            let _guard = lock.lock().await;
            self.replace(platform, thread_id, status).await
        };

        // Last one out removes the lock; waiters still hold a clone
        drop(lock);
        self.locks
            .remove_if(&thread_id, |_, lock| Arc::strong_count(lock) == 1);

        result
    }

    async fn replace(
        &self,
        platform: &dyn ChatPlatform,
        thread_id: ChannelId,
        status: ThreadStatus,
    ) -> Result<MessageId, String> {
        self.remove_previous(platform, thread_id).await;

        let buttons = status_buttons(status);
        let message_id = platform
            .send_message(thread_id, STATUS_BUTTON_CONTENT, &buttons)
            .await
            .map_err(|e| format!("Failed to send status controls: {}", e))?;

        self.messages.insert(thread_id, message_id);
        log::debug!(
            "Thread status: Controls for thread {} now at message {} ({})",
            thread_id,
            message_id,
            status.label()
        );
        Ok(message_id)
    }

    /// Best-effort removal of the previous control message. Never fails.
    async fn remove_previous(&self, platform: &dyn ChatPlatform, thread_id: ChannelId) {
        if let Some(previous) = self.tracked(thread_id) {
            match platform.delete_message(thread_id, previous).await {
                Ok(()) => return,
                Err(e) => log::warn!(
                    "Thread status: Failed to delete control message {} in thread {}: {}",
                    previous,
                    thread_id,
                    e
                ),
            }
        }

        // Untracked (e.g. after a restart) or the tracked delete failed: look for it by content
        let recent = match platform.recent_messages(thread_id, RECOVERY_SCAN_LIMIT).await {
            Ok(recent) => recent,
            Err(e) => {
                log::warn!(
                    "Thread status: Failed to fetch recent messages of thread {}: {}",
                    thread_id,
                    e
                );
                return;
            }
        };

        let bot_id = platform.bot_user_id();
        let Some(stale) = recent
            .iter()
            .find(|m| m.author_id == bot_id && m.content == STATUS_BUTTON_CONTENT)
        else {
            return;
        };

        if let Err(e) = platform.delete_message(thread_id, stale.id).await {
            log::warn!(
                "Thread status: Failed to delete recovered control message {}: {}",
                stale.id,
                e
            );
        }
    }
}
