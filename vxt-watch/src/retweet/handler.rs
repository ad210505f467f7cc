//! End-to-end handling of one VXT bot reply: find the tweet link it answers,
//! wait for its embed, classify, and react or report.

use super::{classify, extract_tweet_url, wait_for_embed, RetryPolicy, RetweetVerdict};
use crate::channels::{ChatMessage, ChatPlatform};
use crate::config::Settings;
use async_trait::async_trait;
use serenity::all::ChannelId;

/// Reaction put on the VXT reply when the tweet is a retweet
pub const RETWEET_MARK: &str = "❌";

pub const MANUAL_CHECK_MESSAGE: &str =
    "Cannot determine if tweet is retweet or not. Manual check required.";

/// Destination for "needs a human" notices and caught errors
#[async_trait]
pub trait ErrorReporter: Send + Sync {
    async fn report(&self, text: &str, link: Option<&str>);
}

/// Posts reports to the configured error channel, or only logs them when there is none
pub struct ChannelReporter<'a> {
    platform: &'a dyn ChatPlatform,
    channel: Option<ChannelId>,
}

impl<'a> ChannelReporter<'a> {
    pub fn new(platform: &'a dyn ChatPlatform, channel: Option<ChannelId>) -> Self {
        Self { platform, channel }
    }
}

#[async_trait]
impl ErrorReporter for ChannelReporter<'_> {
    async fn report(&self, text: &str, link: Option<&str>) {
        let body = format_report(text, link);
        let Some(channel) = self.channel else {
            log::warn!("No error channel configured, dropping report: {}", body);
            return;
        };
        if let Err(e) = self.platform.send_message(channel, &body, &[]).await {
            log::error!("Failed to send error report: {}", e);
        }
    }
}

/// Writes reports to the log only; used by the backfill CLI
pub struct LogReporter;

#[async_trait]
impl ErrorReporter for LogReporter {
    async fn report(&self, text: &str, link: Option<&str>) {
        match link {
            Some(link) => log::error!("{} - {}", text, link),
            None => log::error!("{}", text),
        }
    }
}

fn format_report(text: &str, link: Option<&str>) -> String {
    match link {
        Some(link) => format!("{}\n{}", text, link),
        None => text.to_string(),
    }
}

/// What happened to a relay message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Not a reply in a monitored channel, or the tweet was posted by someone else
    Skipped,
    NoTweetUrl,
    /// The embed never materialized
    NoEmbed,
    Classified(RetweetVerdict),
    /// A platform call failed; the error was reported
    Failed,
}

/// Whether `message` is a VXT bot reply in a monitored channel
pub fn is_relay_candidate(settings: &Settings, message: &ChatMessage) -> bool {
    settings.channel(message.channel_id).is_some()
        && message.author_id == settings.vxt_bot
        && message.reference.is_some()
}

/// Run retweet detection for one VXT bot reply.
///
/// Never fails: platform errors are logged and handed to `reporter`.
pub async fn process_relay_message(
    platform: &dyn ChatPlatform,
    settings: &Settings,
    message: &ChatMessage,
    reporter: &dyn ErrorReporter,
    policy: &RetryPolicy,
) -> RelayOutcome {
    match detect_and_mark(platform, settings, message, reporter, policy).await {
        Ok(outcome) => outcome,
        Err(e) => {
            log::error!("Retweet: Error processing message {}: {}", message.link(), e);
            reporter
                .report(
                    &format!("Error processing message: {}", e),
                    Some(&message.link()),
                )
                .await;
            RelayOutcome::Failed
        }
    }
}

async fn detect_and_mark(
    platform: &dyn ChatPlatform,
    settings: &Settings,
    message: &ChatMessage,
    reporter: &dyn ErrorReporter,
    policy: &RetryPolicy,
) -> Result<RelayOutcome, String> {
    let Some(channel) = settings.channel(message.channel_id) else {
        return Ok(RelayOutcome::Skipped);
    };
    let Some(original_id) = message.reference else {
        return Ok(RelayOutcome::Skipped);
    };

    let original = platform
        .fetch_message(message.channel_id, original_id)
        .await?;

    if !channel.accepts_sender(original.author_id) {
        return Ok(RelayOutcome::Skipped);
    }

    let Some(tweet_url) = extract_tweet_url(&original.content) else {
        log::info!(
            "Retweet: No tweet URL found in original message: {}",
            original.link()
        );
        return Ok(RelayOutcome::NoTweetUrl);
    };

    let Some(with_embed) = wait_for_embed(platform, message, policy).await? else {
        log::info!("Retweet: No embed found after waiting: {}", message.link());
        return Ok(RelayOutcome::NoEmbed);
    };
    let Some(embed) = with_embed.first_embed() else {
        return Ok(RelayOutcome::NoEmbed);
    };

    let verdict = classify(tweet_url, embed);
    match verdict {
        RetweetVerdict::Retweet => {
            log::info!("Retweet: Retweet detected: {}", message.link());
            platform
                .react(original.channel_id, original.id, &settings.retweet_reaction)
                .await?;
            platform
                .react(with_embed.channel_id, with_embed.id, RETWEET_MARK)
                .await?;
        }
        RetweetVerdict::Unknown => {
            log::info!(
                "Retweet: Unknown tweet type, reporting for manual check: {}",
                message.link()
            );
            reporter
                .report(MANUAL_CHECK_MESSAGE, Some(&message.link()))
                .await;
        }
        RetweetVerdict::Original => {
            log::info!(
                "Retweet: Original tweet detected, no action taken: {}",
                message.link()
            );
        }
    }

    Ok(RelayOutcome::Classified(verdict))
}
