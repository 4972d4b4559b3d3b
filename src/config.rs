use std::{env, time::Duration};
use thiserror::Error;

pub const DEFAULT_AFFILIATE_TAG: &str = "budgetlooks08-21";
pub const DEFAULT_TELEGRAM_API_ROOT: &str = "https://api.telegram.org";
pub const DEFAULT_TINYURL_ENDPOINT: &str = "http://tinyurl.com/api-create.php";
pub const DEFAULT_ISGD_ENDPOINT: &str = "https://is.gd/create.php";

const PLACEHOLDER_TOKEN: &str = "YOUR_ACTUAL_BOT_TOKEN_HERE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("TELEGRAM_BOT_TOKEN environment variable is required")]
    MissingBotToken,
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub bot_token: String,
    pub webhook_url: Option<String>,
    pub webhook_secret: Option<String>,
    pub port: u16,
    pub affiliate_tag: String,
    pub request_timeout: Duration,
    pub scrape_timeout: Duration,
    pub queue_capacity: usize,
    pub telegram_api_root: String,
    pub tinyurl_endpoint: String,
    pub isgd_endpoint: String,
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so tests don't have to
    /// mutate the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let bot_token = read("TELEGRAM_BOT_TOKEN")
            .filter(|token| token != PLACEHOLDER_TOKEN)
            .ok_or(ConfigError::MissingBotToken)?;

        let port = match read("PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|_| ConfigError::Invalid {
                key: "PORT",
                value: raw,
            })?,
            None => 5000,
        };

        Ok(Self {
            bot_token,
            webhook_url: read("WEBHOOK_URL").map(|url| url.trim_end_matches('/').to_string()),
            webhook_secret: read("TELEGRAM_WEBHOOK_SECRET"),
            port,
            affiliate_tag: read("AFFILIATE_TAG")
                .unwrap_or_else(|| DEFAULT_AFFILIATE_TAG.to_string()),
            request_timeout: Duration::from_secs(parse_secs(read("REQUEST_TIMEOUT_SECS"), 10)),
            scrape_timeout: Duration::from_secs(parse_secs(read("SCRAPE_TIMEOUT_SECS"), 15)),
            queue_capacity: read("QUEUE_CAPACITY")
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(64),
            telegram_api_root: read("TELEGRAM_API_ROOT")
                .unwrap_or_else(|| DEFAULT_TELEGRAM_API_ROOT.to_string())
                .trim_end_matches('/')
                .to_string(),
            tinyurl_endpoint: read("TINYURL_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_TINYURL_ENDPOINT.to_string()),
            isgd_endpoint: read("ISGD_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_ISGD_ENDPOINT.to_string()),
        })
    }

    /// Full webhook address Telegram should call, if a public base URL is known.
    pub fn webhook_endpoint(&self) -> Option<String> {
        self.webhook_url.as_ref().map(|base| format!("{base}/webhook"))
    }
}

fn parse_secs(raw: Option<String>, default: u64) -> u64 {
    raw.and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}
