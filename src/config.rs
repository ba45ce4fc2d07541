use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    pub youtube_token: Option<String>,
    pub prefix: String,
    /// How long the bot may sit idle in voice before leaving.
    pub afk_timeout: Duration,
    /// How long a paged queue view accepts navigation.
    pub queue_timeout: Duration,
    pub queue_file: Option<PathBuf>,
}

const DEFAULT_PREFIX: &str = "!";
const DEFAULT_AFK_TIMEOUT_SECS: u64 = 1200;
const DEFAULT_QUEUE_TIMEOUT_SECS: u64 = 180;

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let discord_token = get("DISCORD_TOKEN").ok_or(ConfigError::Missing("DISCORD_TOKEN"))?;

        Ok(Config {
            discord_token,
            youtube_token: get("YOUTUBE_TOKEN"),
            prefix: get("BOT_PREFIX").unwrap_or_else(|| DEFAULT_PREFIX.to_string()),
            afk_timeout: seconds(
                "AFK_TIMEOUT_SECS",
                get("AFK_TIMEOUT_SECS"),
                DEFAULT_AFK_TIMEOUT_SECS,
            )?,
            queue_timeout: seconds(
                "QUEUE_TIMEOUT_SECS",
                get("QUEUE_TIMEOUT_SECS"),
                DEFAULT_QUEUE_TIMEOUT_SECS,
            )?,
            queue_file: get("QUEUE_FILE").map(PathBuf::from),
        })
    }
}

fn seconds(name: &'static str, value: Option<String>, default: u64) -> Result<Duration, ConfigError> {
    match value {
        None => Ok(Duration::from_secs(default)),
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn token_is_required() {
        assert!(matches!(config(&[]), Err(ConfigError::Missing("DISCORD_TOKEN"))));
        assert!(matches!(
            config(&[("DISCORD_TOKEN", "  ")]),
            Err(ConfigError::Missing("DISCORD_TOKEN"))
        ));
    }

    #[test]
    fn defaults_apply() {
        let config = config(&[("DISCORD_TOKEN", "token")]).unwrap();
        assert_eq!(config.prefix, "!");
        assert_eq!(config.afk_timeout, Duration::from_secs(1200));
        assert_eq!(config.queue_timeout, Duration::from_secs(180));
        assert!(config.youtube_token.is_none());
        assert!(config.queue_file.is_none());
    }

    #[test]
    fn overrides_are_read() {
        let config = config(&[
            ("DISCORD_TOKEN", "token"),
            ("YOUTUBE_TOKEN", "yt"),
            ("BOT_PREFIX", "$"),
            ("AFK_TIMEOUT_SECS", "60"),
            ("QUEUE_TIMEOUT_SECS", " 30 "),
            ("QUEUE_FILE", "/tmp/queue.txt"),
        ])
        .unwrap();
        assert_eq!(config.youtube_token.as_deref(), Some("yt"));
        assert_eq!(config.prefix, "$");
        assert_eq!(config.afk_timeout, Duration::from_secs(60));
        assert_eq!(config.queue_timeout, Duration::from_secs(30));
        assert_eq!(config.queue_file, Some(PathBuf::from("/tmp/queue.txt")));
    }

    #[test]
    fn malformed_timeouts_are_rejected() {
        let err = config(&[("DISCORD_TOKEN", "token"), ("AFK_TIMEOUT_SECS", "soon")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "AFK_TIMEOUT_SECS", .. }));
    }
}
