//! Environment-derived configuration.
//!
//! Everything comes from environment variables, optionally seeded
//! from a `.env` file by the binary before this module runs. The bot
//! token is the only hard requirement; every other value defaults to
//! the university deployment's settings.

use std::num::ParseIntError;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Default host of the university mail server.
pub const DEFAULT_IMAP_HOST: &str = "mail.ut.ac.ir";
/// Default IMAPS port.
pub const DEFAULT_IMAP_PORT: u16 = 993;
/// Default mailbox to poll.
pub const DEFAULT_MAILBOX: &str = "INBOX";
/// Default HTTP port backing the webhook.
pub const DEFAULT_WEBHOOK_PORT: u16 = 3000;
/// Default seconds between poll ticks.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;
/// Default seconds looked back from process start for the search
/// cutoff.
pub const DEFAULT_LOOKBACK_SECS: u64 = 3600;

/// Configuration failures a caller can act on.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The bot cannot run without a Telegram token.
    #[error("TOKEN environment variable is not set")]
    MissingToken,

    /// A numeric variable failed to parse.
    #[error("invalid value for {variable}: {source}")]
    InvalidNumber {
        variable: &'static str,
        source: ParseIntError,
    },
}

/// Process-wide settings, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Telegram bot token.
    pub token: String,
    /// Public base URL for the webhook. Empty switches the channel
    /// to long polling.
    pub webhook_base: String,
    /// Local port the webhook listener binds to.
    pub webhook_port: u16,
    /// IMAP server host.
    pub imap_host: String,
    /// IMAP server port (implicit TLS).
    pub imap_port: u16,
    /// Mailbox polled for unseen messages.
    pub imap_mailbox: String,
    /// Interval between poll ticks.
    pub poll_interval: Duration,
    /// How far back from process start the search cutoff lies.
    pub lookback: Duration,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    ///
    /// Keeps parsing testable without mutating process-wide state.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let token = lookup("TOKEN")
            .filter(|value| !value.is_empty())
            .ok_or(ConfigError::MissingToken)?;

        let webhook_base = lookup("URL").unwrap_or_default();
        let webhook_port = parse_or("WEBHOOK_PORT", lookup("WEBHOOK_PORT"), DEFAULT_WEBHOOK_PORT)?;

        let imap_host = lookup("IMAP_HOST")
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_IMAP_HOST.to_string());
        let imap_port = parse_or("IMAP_PORT", lookup("IMAP_PORT"), DEFAULT_IMAP_PORT)?;
        let imap_mailbox = lookup("IMAP_MAILBOX")
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_MAILBOX.to_string());

        let poll_secs = parse_or(
            "POLL_INTERVAL_SECS",
            lookup("POLL_INTERVAL_SECS"),
            DEFAULT_POLL_INTERVAL_SECS,
        )?;
        let lookback_secs = parse_or(
            "LOOKBACK_SECS",
            lookup("LOOKBACK_SECS"),
            DEFAULT_LOOKBACK_SECS,
        )?;

        Ok(Self {
            token,
            webhook_base,
            webhook_port,
            imap_host,
            imap_port,
            imap_mailbox,
            poll_interval: Duration::from_secs(poll_secs),
            lookback: Duration::from_secs(lookback_secs),
        })
    }
}

/// Parse an optional variable, falling back to `default` when unset
/// or empty.
fn parse_or<T>(
    variable: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr<Err = ParseIntError>,
{
    match value {
        None => Ok(default),
        Some(raw) if raw.is_empty() => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|source| ConfigError::InvalidNumber { variable, source }),
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn only_token(key: &str) -> Option<String> {
        (key == "TOKEN").then(|| "123:abc".to_string())
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(only_token).unwrap();
        assert_eq!(config.token, "123:abc");
        assert_eq!(config.webhook_base, "");
        assert_eq!(config.webhook_port, DEFAULT_WEBHOOK_PORT);
        assert_eq!(config.imap_host, DEFAULT_IMAP_HOST);
        assert_eq!(config.imap_port, DEFAULT_IMAP_PORT);
        assert_eq!(config.imap_mailbox, DEFAULT_MAILBOX);
        assert_eq!(config.poll_interval, Duration::from_secs(300));
        assert_eq!(config.lookback, Duration::from_secs(3600));
    }

    #[test]
    fn test_missing_token_is_fatal() {
        let err = Config::from_lookup(|_| None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingToken));
    }

    #[test]
    fn test_empty_token_is_fatal() {
        let err = Config::from_lookup(|key| {
            (key == "TOKEN").then(String::new)
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingToken));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(|key| match key {
            "TOKEN" => Some("t".into()),
            "URL" => Some("https://bot.example.com".into()),
            "WEBHOOK_PORT" => Some("8080".into()),
            "IMAP_HOST" => Some("imap.example.com".into()),
            "IMAP_PORT" => Some("1993".into()),
            "IMAP_MAILBOX" => Some("Archive".into()),
            "POLL_INTERVAL_SECS" => Some("60".into()),
            "LOOKBACK_SECS" => Some("120".into()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.webhook_base, "https://bot.example.com");
        assert_eq!(config.webhook_port, 8080);
        assert_eq!(config.imap_host, "imap.example.com");
        assert_eq!(config.imap_port, 1993);
        assert_eq!(config.imap_mailbox, "Archive");
        assert_eq!(config.poll_interval, Duration::from_secs(60));
        assert_eq!(config.lookback, Duration::from_secs(120));
    }

    #[test]
    fn test_invalid_number() {
        let err = Config::from_lookup(|key| match key {
            "TOKEN" => Some("t".into()),
            "IMAP_PORT" => Some("not-a-port".into()),
            _ => None,
        })
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidNumber {
                variable: "IMAP_PORT",
                ..
            }
        ));
    }

    #[test]
    fn test_empty_numeric_uses_default() {
        let config = Config::from_lookup(|key| match key {
            "TOKEN" => Some("t".into()),
            "POLL_INTERVAL_SECS" => Some(String::new()),
            _ => None,
        })
        .unwrap();
        assert_eq!(
            config.poll_interval,
            Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS)
        );
    }
}
