use serde::Deserialize;
use serenity::all::{ChannelId, GuildId, UserId};
use std::collections::HashMap;
use std::env;
use std::path::Path;

/// Environment variable names - single source of truth
pub mod env_vars {
    pub const DISCORD_TOKEN: &str = "DISCORD_TOKEN";
    pub const SETTINGS_PATH: &str = "VXT_WATCH_SETTINGS";
}

/// Default values
pub mod defaults {
    pub const SETTINGS_PATH: &str = "settings.json";
}

/// Get the settings file path from environment or default
pub fn settings_path() -> String {
    env::var(env_vars::SETTINGS_PATH).unwrap_or_else(|_| defaults::SETTINGS_PATH.to_string())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is not set")]
    MissingEnv(&'static str),
    #[error("Failed to read settings file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed settings file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid {field} '{value}': expected a numeric Discord ID")]
    InvalidId { field: String, value: String },
}

/// settings.json as written on disk
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSettings {
    vxt_bot: String,
    guild: String,
    error_channel: Option<String>,
    retweet_reaction: String,
    channels: HashMap<String, RawChannel>,
}

#[derive(Debug, Deserialize)]
struct RawChannel {
    sender: Option<String>,
}

/// A channel the VXT bot posts into that is watched for retweets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoredChannel {
    /// Only tweets posted by this user are checked; `None` accepts any sender
    pub sender: Option<UserId>,
}

impl MonitoredChannel {
    pub fn accepts_sender(&self, author: UserId) -> bool {
        self.sender.is_none_or(|sender| sender == author)
    }
}

/// Validated bot settings
#[derive(Debug, Clone)]
pub struct Settings {
    /// User ID of the VXT relay bot
    pub vxt_bot: UserId,
    /// Guild the slash commands are registered in
    pub guild: GuildId,
    /// Where manual-check requests and errors are reported; `None` means log only
    pub error_channel: Option<ChannelId>,
    /// Reaction put on the original message when a retweet is detected
    pub retweet_reaction: String,
    pub channels: HashMap<ChannelId, MonitoredChannel>,
}

impl Settings {
    /// Load settings from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let label = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: label.clone(),
            source,
        })?;
        Self::from_json(&label, &content)
    }

    /// Parse settings from JSON text; `source` names the origin in error messages
    pub fn from_json(source: &str, content: &str) -> Result<Self, ConfigError> {
        let raw: RawSettings =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse {
                path: source.to_string(),
                source: e,
            })?;

        let mut channels = HashMap::with_capacity(raw.channels.len());
        for (channel_id, channel) in raw.channels {
            let sender = channel
                .sender
                .as_deref()
                .map(|s| parse_id(s, "channel sender").map(UserId::new))
                .transpose()?;
            channels.insert(
                ChannelId::new(parse_id(&channel_id, "channel id")?),
                MonitoredChannel { sender },
            );
        }

        Ok(Self {
            vxt_bot: UserId::new(parse_id(&raw.vxt_bot, "vxtBot")?),
            guild: GuildId::new(parse_id(&raw.guild, "guild")?),
            error_channel: raw
                .error_channel
                .as_deref()
                .map(|s| parse_id(s, "errorChannel").map(ChannelId::new))
                .transpose()?,
            retweet_reaction: raw.retweet_reaction,
            channels,
        })
    }

    /// Monitoring config for a channel, if it is monitored
    pub fn channel(&self, channel_id: ChannelId) -> Option<&MonitoredChannel> {
        self.channels.get(&channel_id)
    }
}

/// Discord IDs are non-zero u64 snowflakes serialized as strings
fn parse_id(value: &str, field: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|id| *id != 0)
        .ok_or_else(|| ConfigError::InvalidId {
            field: field.to_string(),
            value: value.to_string(),
        })
}

/// Everything needed to start the bot
#[derive(Clone)]
pub struct Config {
    pub discord_token: String,
    pub settings: Settings,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let discord_token = env::var(env_vars::DISCORD_TOKEN)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingEnv(env_vars::DISCORD_TOKEN))?;

        let path = settings_path();
        log::info!("Loading settings from {}", path);
        let settings = Settings::load(&path)?;
        log::info!(
            "Monitoring {} channel(s), error channel {}",
            settings.channels.len(),
            settings
                .error_channel
                .map(|c| c.to_string())
                .unwrap_or_else(|| "not configured".to_string())
        );

        Ok(Self {
            discord_token,
            settings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const VALID: &str = r#"{
        "vxtBot": "1001",
        "guild": "2002",
        "errorChannel": "3003",
        "retweetReaction": "🔁",
        "channels": {
            "4004": { "sender": "5005" },
            "6006": { "sender": null }
        }
    }"#;

    #[test]
    fn test_parse_valid_settings() {
        let settings = Settings::from_json("test", VALID).unwrap();

        assert_eq!(settings.vxt_bot, UserId::new(1001));
        assert_eq!(settings.guild, GuildId::new(2002));
        assert_eq!(settings.error_channel, Some(ChannelId::new(3003)));
        assert_eq!(settings.retweet_reaction, "🔁");
        assert_eq!(settings.channels.len(), 2);
        assert_eq!(
            settings.channel(ChannelId::new(4004)),
            Some(&MonitoredChannel {
                sender: Some(UserId::new(5005))
            })
        );
        assert_eq!(settings.channel(ChannelId::new(7007)), None);
    }

    #[test]
    fn test_null_sender_accepts_anyone() {
        let settings = Settings::from_json("test", VALID).unwrap();

        let open = settings.channel(ChannelId::new(6006)).unwrap();
        assert!(open.accepts_sender(UserId::new(42)));

        let restricted = settings.channel(ChannelId::new(4004)).unwrap();
        assert!(restricted.accepts_sender(UserId::new(5005)));
        assert!(!restricted.accepts_sender(UserId::new(42)));
    }

    #[test]
    fn test_missing_error_channel() {
        let json = r#"{
            "vxtBot": "1", "guild": "2", "errorChannel": null,
            "retweetReaction": "🔁", "channels": {}
        }"#;
        let settings = Settings::from_json("test", json).unwrap();
        assert_eq!(settings.error_channel, None);
        assert!(settings.channels.is_empty());
    }

    #[test]
    fn test_invalid_ids_rejected() {
        let json = VALID.replace("\"1001\"", "\"not-a-number\"");
        match Settings::from_json("test", &json) {
            Err(ConfigError::InvalidId { field, .. }) => assert_eq!(field, "vxtBot"),
            other => panic!("expected InvalidId, got {:?}", other),
        }

        let json = VALID.replace("\"4004\"", "\"0\"");
        assert!(matches!(
            Settings::from_json("test", &json),
            Err(ConfigError::InvalidId { .. })
        ));
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(matches!(
            Settings::from_json("test", "{ not json"),
            Err(ConfigError::Parse { .. })
        ));
        // Missing required key
        assert!(matches!(
            Settings::from_json("test", r#"{ "vxtBot": "1" }"#),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(VALID.as_bytes()).unwrap();

        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.vxt_bot, UserId::new(1001));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Settings::load(dir.path().join("settings.json"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
