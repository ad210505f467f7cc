//! Waiting for the relay bot's embed to be unfurled.
//!
//! Discord attaches link embeds asynchronously, so a freshly posted reply often
//! has none yet. The message is re-fetched on a fixed delay schedule until an
//! embed shows up or the schedule runs out.

use crate::channels::{ChatMessage, ChatPlatform};
use std::time::Duration;

/// Delays before each re-fetch, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    delays: Vec<Duration>,
}

impl RetryPolicy {
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    pub fn attempts(&self) -> usize {
        self.delays.len()
    }

    /// Worst-case time spent sleeping before giving up
    pub fn max_wait(&self) -> Duration {
        self.delays.iter().sum()
    }
}

impl Default for RetryPolicy {
    /// 1s, 5s, 10s: 16 seconds in the worst case
    fn default() -> Self {
        Self::new(vec![
            Duration::from_secs(1),
            Duration::from_secs(5),
            Duration::from_secs(10),
        ])
    }
}

/// Return `message` (or a fresher copy of it) once it carries at least one embed.
///
/// `Ok(None)` means no embed appeared within the policy's budget. A failed
/// re-fetch aborts the wait with that error.
pub async fn wait_for_embed(
    platform: &dyn ChatPlatform,
    message: &ChatMessage,
    policy: &RetryPolicy,
) -> Result<Option<ChatMessage>, String> {
    if message.has_embed() {
        return Ok(Some(message.clone()));
    }

    for (attempt, delay) in policy.delays().iter().enumerate() {
        tokio::time::sleep(*delay).await;

        let fetched = platform
            .fetch_message(message.channel_id, message.id)
            .await?;

        if fetched.has_embed() {
            log::debug!(
                "Retweet: Embed for message {} appeared after {} re-fetch(es)",
                message.id,
                attempt + 1
            );
            return Ok(Some(fetched));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::EmbedSnapshot;
    use crate::channels::mock::{message, MockPlatform};
    use tokio::time::Instant;

    fn embed() -> EmbedSnapshot {
        EmbedSnapshot::with_url("https://x.com/a/status/1")
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts(), 3);
        assert_eq!(policy.max_wait(), Duration::from_secs(16));
    }

    #[tokio::test(start_paused = true)]
    async fn test_existing_embed_returns_immediately() {
        let platform = MockPlatform::new();
        let mut msg = message(1, 10, 5, "hi");
        msg.embeds.push(embed());
        platform.insert(msg.clone());

        let start = Instant::now();
        let found = wait_for_embed(&platform, &msg, &RetryPolicy::default())
            .await
            .unwrap();

        assert!(found.is_some());
        assert_eq!(platform.fetch_count(msg.id), 0);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_embed_appears_on_second_fetch() {
        let platform = MockPlatform::new();
        let msg = message(1, 10, 5, "hi");
        platform.insert(msg.clone());
        platform.embed_after_fetches(msg.id, 2, vec![embed()]);

        let start = Instant::now();
        let found = wait_for_embed(&platform, &msg, &RetryPolicy::default())
            .await
            .unwrap()
            .expect("embed should appear");

        assert_eq!(found.embeds, vec![embed()]);
        assert_eq!(platform.fetch_count(msg.id), 2);
        assert_eq!(start.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_three_fetches() {
        let platform = MockPlatform::new();
        let msg = message(1, 10, 5, "hi");
        platform.insert(msg.clone());

        let start = Instant::now();
        let found = wait_for_embed(&platform, &msg, &RetryPolicy::default())
            .await
            .unwrap();

        assert!(found.is_none());
        assert_eq!(platform.fetch_count(msg.id), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(16));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_failure_propagates() {
        let platform = MockPlatform::new();
        let msg = message(1, 10, 5, "hi");
        platform.insert(msg.clone());
        platform.fail_fetch(msg.id);

        let result = wait_for_embed(&platform, &msg, &RetryPolicy::default()).await;

        assert!(result.is_err());
        assert_eq!(platform.fetch_count(msg.id), 1);
    }
}
