//! Retweet detection for tweets relayed by the VXT bot
//!
//! The VXT bot replies to a tweet link with an unfurled embed. For a retweet the
//! unfurling service resolves the embed URL to the *original* tweet, so the tweet
//! ID in the embed differs from the one in the posted link. For an original tweet
//! both IDs match. The retweet flag exposed by the embed is not reliable and is
//! never consulted.

pub mod embed_wait;
pub mod handler;

pub use embed_wait::{wait_for_embed, RetryPolicy};
pub use handler::{process_relay_message, ErrorReporter, RelayOutcome};

use crate::channels::EmbedSnapshot;
use once_cell::sync::Lazy;
use regex::Regex;

/// `/status/<digits>` path segment of a tweet permalink
static TWEET_ID_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"/status/(\d+)").unwrap());

/// Tweet URL wrapped in angle brackets (Discord's "no preview" form)
static TWEET_URL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<(https?://(?:twitter|x)\.com/[^\s>]+)>").unwrap());

/// Result of comparing a posted tweet link with the relay bot's embed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetweetVerdict {
    Original,
    Retweet,
    /// Not enough information to decide; needs a manual check
    Unknown,
}

/// Extract the tweet ID from a Twitter/X (or mirror) URL
///
/// Accepts any host, e.g. `https://x.com/user/status/123` or
/// `https://fxtwitter.com/i/status/123/`.
pub fn extract_tweet_id(url: &str) -> Option<&str> {
    TWEET_ID_PATTERN
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Extract a `<https://twitter.com/...>` or `<https://x.com/...>` link from message text,
/// returning the URL without the brackets
pub fn extract_tweet_url(content: &str) -> Option<&str> {
    TWEET_URL_PATTERN
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Decide whether the tweet at `tweet_url` is a retweet, given the embed the relay bot produced for it
pub fn classify(tweet_url: &str, embed: &EmbedSnapshot) -> RetweetVerdict {
    let Some(root_url) = embed.url.as_deref() else {
        return RetweetVerdict::Unknown;
    };
    let Some(root_id) = extract_tweet_id(root_url) else {
        return RetweetVerdict::Unknown;
    };
    let Some(posted_id) = extract_tweet_id(tweet_url) else {
        return RetweetVerdict::Unknown;
    };

    if root_id == posted_id {
        RetweetVerdict::Original
    } else {
        RetweetVerdict::Retweet
    }
}
