// Daemon settings, read from environment variables only.

use anyhow::Result;
use cfddns_core::RecordOrigin;
use cfddns_core::config::RECORDS_ENV_KEY;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

pub const DEFAULT_CONFIG_FILE: &str = "/etc/cfddns/config.toml";
pub const DEFAULT_ADMIN_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_NOTIFY_SUBJECT: &str = "Your External IP has changed!";
const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 60;
const MAX_REFRESH_INTERVAL_SECS: u64 = 86_400;

/// What the process does after startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Poll forever
    Daemon,
    /// One update pass, then exit
    OneOff,
    /// One delete-mode pass, then exit
    Delete,
}

impl RunMode {
    fn parse(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "daemon" => Ok(Self::Daemon),
            "oneoff" | "one-off" => Ok(Self::OneOff),
            "delete" => Ok(Self::Delete),
            other => anyhow::bail!(
                "DDNS_MODE '{}' is not valid. Valid modes: daemon, oneoff, delete",
                other
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Application configuration
pub struct Config {
    pub api_token: String,
    pub api_url: Option<String>,
    pub mode: RunMode,
    pub refresh_interval: Duration,
    pub delete_mode: bool,
    pub records: RecordOrigin,
    pub config_file: PathBuf,
    pub admin_addr: Option<SocketAddr>,
    pub notify_webhook_url: Option<String>,
    pub notify_subject: String,
    pub log_level: Level,
    pub log_format: LogFormat,
}

// The token must never show up in logs
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_token", &"<REDACTED>")
            .field("api_url", &self.api_url)
            .field("mode", &self.mode)
            .field("refresh_interval", &self.refresh_interval)
            .field("delete_mode", &self.delete_mode)
            .field("records", &self.records)
            .field("config_file", &self.config_file)
            .field("admin_addr", &self.admin_addr)
            .field("notify_webhook_url", &self.notify_webhook_url)
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    ///
    /// Performs all parsing and validation; nothing else runs before this
    /// succeeds.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string());

        let api_token = var("DDNS_PROVIDER_API_TOKEN").unwrap_or_default();
        if api_token.is_empty() {
            anyhow::bail!(
                "DDNS_PROVIDER_API_TOKEN is required. \
                Set it via: export DDNS_PROVIDER_API_TOKEN=your_token"
            );
        }

        let api_url = var("DDNS_PROVIDER_API_URL").filter(|u| !u.is_empty());
        if let Some(ref url) = api_url
            && !url.starts_with("https://")
            && !url.starts_with("http://")
        {
            anyhow::bail!(
                "DDNS_PROVIDER_API_URL must use HTTP or HTTPS scheme. Got: {}",
                url
            );
        }

        let mode = match var("DDNS_MODE") {
            Some(mode) if !mode.is_empty() => RunMode::parse(&mode)?,
            _ => RunMode::Daemon,
        };

        let interval_secs = match var("DDNS_REFRESH_INTERVAL") {
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                anyhow::anyhow!("DDNS_REFRESH_INTERVAL must be a number of seconds. Got: {}", raw)
            })?,
            None => DEFAULT_REFRESH_INTERVAL_SECS,
        };
        if !(1..=MAX_REFRESH_INTERVAL_SECS).contains(&interval_secs) {
            anyhow::bail!(
                "DDNS_REFRESH_INTERVAL must be between 1 and {} seconds. Got: {}",
                MAX_REFRESH_INTERVAL_SECS,
                interval_secs
            );
        }

        let delete_mode = match var("DDNS_DELETE_MODE") {
            Some(raw) => parse_bool("DDNS_DELETE_MODE", &raw)?,
            None => false,
        };

        let config_file = var("DDNS_CONFIG_FILE")
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());
        let config_file = PathBuf::from(config_file);
        let records = RecordOrigin::select(lookup(RECORDS_ENV_KEY), config_file.clone());

        let admin_addr = match var("DDNS_ADMIN_ADDR") {
            Some(raw) if raw.is_empty() => None,
            Some(raw) => Some(parse_addr(&raw)?),
            None => Some(parse_addr(DEFAULT_ADMIN_ADDR)?),
        };

        let notify_webhook_url = var("DDNS_NOTIFY_WEBHOOK_URL").filter(|u| !u.is_empty());
        if let Some(ref url) = notify_webhook_url
            && !url.starts_with("https://")
            && !url.starts_with("http://")
        {
            anyhow::bail!(
                "DDNS_NOTIFY_WEBHOOK_URL must use HTTP or HTTPS scheme. Got: {}",
                url
            );
        }

        let notify_subject = var("DDNS_NOTIFY_SUBJECT")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_NOTIFY_SUBJECT.to_string());

        let log_level = match var("DDNS_LOG_LEVEL")
            .unwrap_or_else(|| "info".to_string())
            .to_lowercase()
            .as_str()
        {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            other => anyhow::bail!(
                "DDNS_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                other
            ),
        };

        let log_format = match var("DDNS_LOG_FORMAT")
            .unwrap_or_else(|| "text".to_string())
            .to_lowercase()
            .as_str()
        {
            "text" | "" => LogFormat::Text,
            "json" => LogFormat::Json,
            other => anyhow::bail!(
                "DDNS_LOG_FORMAT '{}' is not valid. Valid formats: text, json",
                other
            ),
        };

        Ok(Self {
            api_token,
            api_url,
            mode,
            refresh_interval: Duration::from_secs(interval_secs),
            delete_mode,
            records,
            config_file,
            admin_addr,
            notify_webhook_url,
            notify_subject,
            log_level,
            log_format,
        })
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => anyhow::bail!("{} must be true or false. Got: {}", key, raw),
    }
}

fn parse_addr(raw: &str) -> Result<SocketAddr> {
    raw.parse()
        .map_err(|_| anyhow::anyhow!("DDNS_ADMIN_ADDR must be host:port. Got: {}", raw))
}
