//! Configuration types for cfddns
//!
//! This module defines the desired-record model, the two record origins
//! (an environment JSON blob or a TOML file) and the scheduler settings.

use crate::error::{Error, Result};
use crate::traits::RecordSpec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment key whose presence selects the JSON blob origin
pub const RECORDS_ENV_KEY: &str = "DDNS_RECORDS";

/// Default TTL; Cloudflare treats 1 as "automatic"
pub const DEFAULT_TTL: u32 = 1;

/// DNS record type of a desired record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RecordType {
    #[default]
    A,
    Aaaa,
    Cname,
    /// Any other type, passed through to the provider verbatim
    Other(String),
}

impl RecordType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::A => "A",
            Self::Aaaa => "AAAA",
            Self::Cname => "CNAME",
            Self::Other(other) => other,
        }
    }
}

impl From<String> for RecordType {
    fn from(value: String) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "A" => Self::A,
            "AAAA" => Self::Aaaa,
            "CNAME" => Self::Cname,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for RecordType {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<RecordType> for String {
    fn from(value: RecordType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A caller-declared record the engine converges the provider towards
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesiredRecord {
    /// Fully qualified record name (e.g., "home.example.com")
    pub name: String,

    /// Record type
    #[serde(rename = "type", default)]
    pub record_type: RecordType,

    /// Target for CNAME records; ignored for every other type
    #[serde(default, alias = "cnameTarget", skip_serializing_if = "String::is_empty")]
    pub cname: String,

    /// Route traffic through the provider edge
    #[serde(default)]
    pub proxied: bool,

    /// Time-to-live in seconds
    #[serde(default = "default_ttl")]
    pub ttl: u32,

    /// Zone the record lives in (e.g., "example.com")
    #[serde(alias = "zone_name")]
    pub zone_name: String,

    /// Survive delete-mode passes
    #[serde(default, alias = "keep_after_delete")]
    pub keep_after_delete: bool,
}

fn default_ttl() -> u32 {
    DEFAULT_TTL
}

impl DesiredRecord {
    /// Create an A record with default settings
    pub fn new(name: impl Into<String>, zone_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            record_type: RecordType::A,
            cname: String::new(),
            proxied: false,
            ttl: DEFAULT_TTL,
            zone_name: zone_name.into(),
            keep_after_delete: false,
        }
    }

    /// Turn this into a CNAME record pointing at `target`
    pub fn with_cname(mut self, target: impl Into<String>) -> Self {
        self.record_type = RecordType::Cname;
        self.cname = target.into();
        self
    }

    /// Set the record type
    pub fn with_type(mut self, record_type: RecordType) -> Self {
        self.record_type = record_type;
        self
    }

    /// Set the proxied flag
    pub fn with_proxied(mut self, proxied: bool) -> Self {
        self.proxied = proxied;
        self
    }

    /// Set the TTL
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    /// Keep the record when running in delete mode
    pub fn with_keep_after_delete(mut self, keep: bool) -> Self {
        self.keep_after_delete = keep;
        self
    }

    pub fn is_cname(&self) -> bool {
        self.record_type == RecordType::Cname
    }

    /// Resolve the content this record should carry
    ///
    /// CNAME records carry their target; every other type carries the
    /// current public IP. Returns [`Error::Validation`] when a CNAME has no
    /// target or when the IP is needed but unknown.
    pub fn desired_content(&self, current_ip: Option<&str>) -> Result<String> {
        if self.is_cname() {
            if self.cname.trim().is_empty() {
                return Err(Error::validation(format!(
                    "CNAME record {} has an empty target",
                    self.name
                )));
            }
            return Ok(self.cname.clone());
        }

        match current_ip.filter(|ip| !ip.is_empty()) {
            Some(ip) => Ok(ip.to_string()),
            None => Err(Error::validation(format!(
                "current IP unknown, cannot resolve content for {}",
                self.name
            ))),
        }
    }

    /// Build the provider-side spec for this record with resolved content
    pub fn spec(&self, content: impl Into<String>) -> RecordSpec {
        RecordSpec {
            name: self.name.clone(),
            record_type: self.record_type.to_string(),
            content: content.into(),
            proxied: self.proxied,
            ttl: self.ttl,
        }
    }

    /// Structural checks applied when records are loaded
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::config("Record name cannot be empty"));
        }
        if self.zone_name.trim().is_empty() {
            return Err(Error::config(format!(
                "Record {} has an empty zoneName",
                self.name
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
struct RecordsFile {
    #[serde(default)]
    records: Vec<DesiredRecord>,
}

/// Where desired records are read from
///
/// The two origins are mutually exclusive: when the environment key is
/// present its value wins and the file is never opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOrigin {
    /// JSON array taken from the environment
    Env(String),
    /// TOML file with `[[records]]` tables
    File(PathBuf),
}

impl RecordOrigin {
    /// Pick the origin from an optional environment value and a file fallback
    pub fn select(env_blob: Option<String>, file: impl Into<PathBuf>) -> Self {
        match env_blob {
            Some(blob) => Self::Env(blob),
            None => Self::File(file.into()),
        }
    }

    /// Short label for logs
    pub fn describe(&self) -> String {
        match self {
            Self::Env(_) => format!("env:{}", RECORDS_ENV_KEY),
            Self::File(path) => format!("file:{}", path.display()),
        }
    }

    /// Read and validate the records
    pub fn load(&self) -> Result<Vec<DesiredRecord>> {
        let records = match self {
            Self::Env(blob) => parse_records_json(blob)?,
            Self::File(path) => load_records_file(path)?,
        };

        for record in &records {
            record.validate()?;
        }

        Ok(records)
    }
}

/// Parse a JSON array of desired records
pub fn parse_records_json(blob: &str) -> Result<Vec<DesiredRecord>> {
    serde_json::from_str(blob)
        .map_err(|e| Error::config(format!("{} is not a valid record list: {}", RECORDS_ENV_KEY, e)))
}

/// Parse a TOML document containing `[[records]]` tables
pub fn parse_records_toml(text: &str) -> Result<Vec<DesiredRecord>> {
    let file: RecordsFile =
        toml::from_str(text).map_err(|e| Error::config(format!("Invalid records file: {}", e)))?;
    Ok(file.records)
}

fn load_records_file(path: &Path) -> Result<Vec<DesiredRecord>> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        Error::config(format!("Cannot read records file {}: {}", path.display(), e))
    })?;
    parse_records_toml(&text)
}

/// Scheduler settings
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Time between IP checks
    pub poll_interval: Duration,

    /// Delete matching records instead of updating them
    pub delete_mode: bool,

    /// Capacity of the scheduler event channel
    pub event_channel_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            delete_mode: false,
            event_channel_capacity: 100,
        }
    }
}
