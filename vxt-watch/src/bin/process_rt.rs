//! Re-run retweet detection over the recent history of one monitored channel.
//!
//! ## Usage
//!
//!   DISCORD_TOKEN="..." cargo run --bin process-rt -- --channel <id> --count <n>
//!
//! Problems are written to the log (stderr) only; nothing is posted to the
//! error channel.

use clap::Parser;
use dotenv::dotenv;
use serenity::all::{ChannelId, GetMessages, Http, Message, MessageId};
use std::sync::Arc;
use vxt_watch::channels::{ChatMessage, DiscordPlatform};
use vxt_watch::config::{env_vars, settings_path, Settings};
use vxt_watch::retweet::handler::{is_relay_candidate, LogReporter};
use vxt_watch::retweet::{process_relay_message, RetryPolicy};

/// Discord returns at most this many messages per history request
const PAGE_SIZE: usize = 100;

#[derive(Parser, Debug)]
#[command(name = "process-rt", about = "Process RT detection for existing messages on a channel")]
struct Args {
    /// Channel ID to process
    #[arg(short, long)]
    channel: u64,

    /// Number of messages to process
    #[arg(short = 'n', long, value_parser = clap::value_parser!(u32).range(1..))]
    count: u32,
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        log::error!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), String> {
    let settings = Settings::load(settings_path()).map_err(|e| e.to_string())?;

    if args.channel == 0 {
        return Err("Channel ID must be non-zero".to_string());
    }
    let channel_id = ChannelId::new(args.channel);
    if settings.channel(channel_id).is_none() {
        return Err(format!("Channel {} is not in the configuration", channel_id));
    }

    let token = std::env::var(env_vars::DISCORD_TOKEN)
        .map_err(|_| format!("{} environment variable is not set", env_vars::DISCORD_TOKEN))?;

    log::info!("Connecting to Discord...");
    let http = Arc::new(Http::new(&token));
    let me = http
        .get_current_user()
        .await
        .map_err(|e| format!("Failed to log in: {}", e))?;
    log::info!("Logged in as {}", me.name);

    log::info!(
        "Fetching last {} messages in channel {}...",
        args.count,
        channel_id
    );
    let history = fetch_history(&http, channel_id, args.count as usize).await?;
    log::info!("Fetched {} messages", history.len());

    let candidates: Vec<ChatMessage> = history
        .iter()
        .map(ChatMessage::from)
        .filter(|m| is_relay_candidate(&settings, m))
        .collect();
    log::info!("Found {} VXT reply messages to process", candidates.len());

    let platform = DiscordPlatform::new(http.clone(), me.id);
    let policy = RetryPolicy::default();

    // One at a time to stay clear of rate limits
    for (index, message) in candidates.iter().enumerate() {
        log::info!("Processing message {}/{}...", index + 1, candidates.len());
        let outcome =
            process_relay_message(&platform, &settings, message, &LogReporter, &policy).await;
        log::debug!("Message {}: {:?}", message.id, outcome);
    }

    log::info!("Processing complete!");
    Ok(())
}

/// Newest-first history of a channel, paging backwards until `count` messages are collected
async fn fetch_history(
    http: &Arc<Http>,
    channel_id: ChannelId,
    count: usize,
) -> Result<Vec<Message>, String> {
    let mut messages: Vec<Message> = Vec::with_capacity(next_page_size(0, count));
    let mut before: Option<MessageId> = None;

    while messages.len() < count {
        let page = next_page_size(messages.len(), count);
        let mut request = GetMessages::new().limit(page as u8);
        if let Some(before) = before {
            request = request.before(before);
        }

        let batch = channel_id
            .messages(http, request)
            .await
            .map_err(|e| format!("Failed to fetch messages: {}", e))?;

        let exhausted = batch.len() < page;
        before = batch.last().map(|m| m.id);
        messages.extend(batch);

        if exhausted {
            break;
        }
    }

    Ok(messages)
}

/// Size of the next history request; never more than one page, whatever `count` is
fn next_page_size(collected: usize, count: usize) -> usize {
    count.saturating_sub(collected).min(PAGE_SIZE)
}
