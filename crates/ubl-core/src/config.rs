//! Runtime configuration, read from a TOML file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::decision::AccessPolicy;
use crate::feed::{ColumnNameMapping, DEFAULT_DATE_FORMAT, FeedParser};

/// Longest accepted refresh interval, one week.
pub const MAX_REFRESH_MINUTES: u64 = 7 * 24 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("serialise error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UblConfig {
    pub spreadsheet_id: String,
    pub worksheet_id: String,
    /// strftime pattern matched against the normalised expiry text.
    pub date_format: String,
    pub header_rows: usize,
    pub refresh_minutes: u64,
    pub fetch_timeout_secs: u64,
    pub waiting_message: String,
    /// Placeholders: `{{caseUrl}}`, `{{banned}}`, `{{lengthOfBan}}`,
    /// `{{expires}}`, `{{reason}}`, `{{ign}}`.
    pub banned_message: String,
    pub excluded_uuids: Vec<String>,
    pub backup_file: PathBuf,
    pub column_names: ColumnNameMapping,
}

impl Default for UblConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            worksheet_id: "od6".into(),
            date_format: DEFAULT_DATE_FORMAT.into(),
            header_rows: 1,
            refresh_minutes: 10,
            fetch_timeout_secs: 30,
            waiting_message: "The UBL has not loaded yet, please try again in a few seconds".into(),
            banned_message: "You are on the UBL: {{reason}}\nBanned {{banned}} for {{lengthOfBan}}, expires {{expires}}\n{{caseUrl}}".into(),
            excluded_uuids: Vec::new(),
            backup_file: PathBuf::from("ubl-backup.toml"),
            column_names: ColumnNameMapping::default(),
        }
    }
}

impl UblConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`. A missing file is created with the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Self::default();
            std::fs::write(path, toml::to_string_pretty(&config)?)?;
            info!(path = %path.display(), "wrote default configuration");
            return Ok(config);
        }
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_minutes == 0 {
            return Err(ConfigError::Validation("refresh_minutes must be at least 1".into()));
        }
        if self.refresh_minutes > MAX_REFRESH_MINUTES {
            return Err(ConfigError::Validation(format!(
                "refresh_minutes must be at most {MAX_REFRESH_MINUTES}"
            )));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::Validation("fetch_timeout_secs must be at least 1".into()));
        }
        if self.date_format.trim().is_empty() {
            return Err(ConfigError::Validation("date_format must not be empty".into()));
        }
        Ok(())
    }

    pub fn refresh_period(&self) -> Duration {
        Duration::from_secs(self.refresh_minutes.saturating_mul(60))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Parsed exclusions. Entries that are not UUIDs are dropped with a warning.
    pub fn excluded_identities(&self) -> HashSet<Uuid> {
        self.excluded_uuids
            .iter()
            .filter_map(|raw| match Uuid::try_parse(raw.trim()) {
                Ok(uuid) => Some(uuid),
                Err(err) => {
                    warn!(entry = %raw, error = %err, "ignoring invalid excluded uuid");
                    None
                }
            })
            .collect()
    }

    pub fn feed_parser(&self) -> FeedParser {
        FeedParser::new(self.column_names.clone(), self.date_format.clone(), self.header_rows)
    }

    pub fn access_policy(&self) -> AccessPolicy {
        AccessPolicy::new(
            self.waiting_message.clone(),
            self.banned_message.clone(),
            self.excluded_identities(),
        )
    }
}
