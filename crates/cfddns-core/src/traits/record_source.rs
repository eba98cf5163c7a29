// # Record Source Trait
//
// Produces the desired record set at startup and on every reload request.

use crate::config::{DesiredRecord, RecordOrigin, RECORDS_ENV_KEY};
use std::path::PathBuf;

/// Loads the desired records
pub trait RecordSource: Send + Sync {
    /// Load a fresh, validated list of desired records
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<DesiredRecord>)`: Records in declaration order
    /// - `Err(Error::Config)`: The origin is unreadable or malformed
    fn load(&self) -> Result<Vec<DesiredRecord>, crate::Error>;
}

/// Reads records from the environment blob if present, else from a file
///
/// The environment is consulted on every load, so a reload can switch
/// origins.
#[derive(Debug, Clone)]
pub struct ConfigRecordSource {
    env_key: String,
    file: PathBuf,
}

impl ConfigRecordSource {
    /// Create a source that falls back to `file`
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            env_key: RECORDS_ENV_KEY.to_string(),
            file: file.into(),
        }
    }

    /// Use a different environment key
    pub fn with_env_key(mut self, key: impl Into<String>) -> Self {
        self.env_key = key.into();
        self
    }

    /// The origin the next load would read from
    pub fn origin(&self) -> RecordOrigin {
        RecordOrigin::select(std::env::var(&self.env_key).ok(), self.file.clone())
    }
}

impl RecordSource for ConfigRecordSource {
    fn load(&self) -> Result<Vec<DesiredRecord>, crate::Error> {
        let origin = self.origin();
        tracing::debug!(origin = %origin.describe(), "Loading desired records");
        origin.load()
    }
}
