//! Configuration module for environment variable parsing.
//!
//! Every setting has a default so a local run only needs a recipient file
//! and, for real delivery, Mailgun credentials.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

/// Which mail backend the dispatcher should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailProvider {
    /// Deliver through the Mailgun HTTP API
    Mailgun,
    /// Log messages instead of delivering them
    DryRun,
}

impl FromStr for MailProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mailgun" => Ok(MailProvider::Mailgun),
            "dry-run" | "dryrun" | "log" => Ok(MailProvider::DryRun),
            other => Err(format!("unknown mail provider: {other}")),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the tracking server to listen on
    pub port: u16,

    /// JSON file holding the recipient rows
    pub recipient_store_path: PathBuf,

    /// Public URL of the tracking pixel endpoint embedded in every message
    pub tracking_base_url: String,

    /// Sender aliases to rotate through, in order
    pub sender_aliases: Vec<String>,

    /// Display name attached to every alias in the From header
    pub sender_name: Option<String>,

    /// Maximum sends per UTC day
    pub daily_send_limit: u32,

    /// File holding today's send count, shared by every dispatcher process.
    /// `None` keeps the count in memory only.
    pub quota_state_path: Option<PathBuf>,

    /// Fixed pause between consecutive sends in milliseconds
    pub send_delay_ms: u64,

    /// Opens arriving sooner than this after the send are ignored.
    ///
    /// The documented behavior is 10 seconds; other values are for testing
    /// or for tuning against a provider's link scanner only.
    pub debounce_secs: u64,

    /// When set, the web binary also runs the dispatcher on this interval
    pub dispatch_interval_secs: Option<u64>,

    /// Selected mail backend
    pub mail_provider: MailProvider,

    /// Mailgun API key
    pub mailgun_api_key: Option<String>,

    /// Mailgun sending domain
    pub mailgun_domain: Option<String>,

    /// Mailgun API base URL (EU accounts use a different host)
    pub mailgun_api_base: String,

    /// HTTP request timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let recipient_store_path = env::var("RECIPIENT_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("recipients.json"));

        let quota_state_path = env::var("QUOTA_STATE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| recipient_store_path.with_extension("quota.json"));

        Config {
            port: parse_or("PORT", 8080),

            recipient_store_path,

            quota_state_path: Some(quota_state_path),

            tracking_base_url: env::var("TRACKING_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080/track".to_string()),

            sender_aliases: parse_csv("SENDER_ALIASES").unwrap_or_default(),

            sender_name: env::var("SENDER_NAME").ok().filter(|s| !s.trim().is_empty()),

            daily_send_limit: parse_or("DAILY_SEND_LIMIT", 100),

            send_delay_ms: parse_or("SEND_DELAY_MS", 2000),

            debounce_secs: parse_or("DEBOUNCE_SECS", 10),

            dispatch_interval_secs: parse_opt("DISPATCH_INTERVAL_SECS"),

            mail_provider: parse_or("MAIL_PROVIDER", MailProvider::DryRun),

            mailgun_api_key: env::var("MAILGUN_API_KEY").ok(),

            mailgun_domain: env::var("MAILGUN_DOMAIN").ok(),

            mailgun_api_base: env::var("MAILGUN_API_BASE")
                .unwrap_or_else(|_| "https://api.mailgun.net".to_string()),

            request_timeout_ms: parse_or("REQUEST_TIMEOUT_MS", 8000),
        }
    }

    pub fn send_delay(&self) -> Duration {
        Duration::from_millis(self.send_delay_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_secs(self.debounce_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
impl Config {
    /// Fixed configuration for unit tests, independent of the environment.
    pub(crate) fn for_tests() -> Self {
        Config {
            port: 8080,
            recipient_store_path: PathBuf::from("recipients.json"),
            tracking_base_url: "http://localhost:8080/track".to_string(),
            sender_aliases: vec!["a@mg.example.com".to_string()],
            sender_name: Some("Example".to_string()),
            daily_send_limit: 50,
            quota_state_path: None,
            send_delay_ms: 0,
            debounce_secs: 10,
            dispatch_interval_secs: None,
            mail_provider: MailProvider::DryRun,
            mailgun_api_key: Some("key-123".to_string()),
            mailgun_domain: Some("mg.example.com".to_string()),
            mailgun_api_base: "https://api.eu.mailgun.net/".to_string(),
            request_timeout_ms: 1000,
        }
    }
}

/// Parse a variable, falling back to `default` when unset or malformed.
fn parse_or<T: FromStr>(name: &str, default: T) -> T {
    parse_opt(name).unwrap_or(default)
}

/// Parse an optional variable. Malformed values are logged and ignored.
fn parse_opt<T: FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid value, using default");
            None
        }
    }
}

/// Parse a comma-separated list of strings.
fn parse_csv(name: &str) -> Option<Vec<String>> {
    env::var(name).ok().map(|raw| {
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}
