//! Local TOML backup of the last good record set.
//!
//! One table per identity:
//!
//! ```toml
//! [c0b075fa-049d-49ec-879e-45e5f0e66b08]
//! caseUrl = "https://redd.it/abc123"
//! banned = "January 1, 2017"
//! expires = "2017-03-15"
//! ign = "Notch"
//! lengthofban = "30 days"
//! reason = "Xray"
//! ```
//!
//! `expires` is omitted for indefinite bans.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use toml::{Table, Value};
use tracing::{debug, info, warn};
use ubl_core::date::{format_backup_date, parse_backup_date};
use ubl_core::{BanRecord, Diagnostic, DiagnosticKind, ParseOutcome, RecordSet, RowError, parse_identity};

use crate::{RecordStore, StoreError};

const CASE_URL_KEY: &str = "caseUrl";
const BANNED_KEY: &str = "banned";
const EXPIRES_KEY: &str = "expires";
const IGN_KEY: &str = "ign";
const LENGTH_OF_BAN_KEY: &str = "lengthofban";
const REASON_KEY: &str = "reason";

#[derive(Serialize)]
struct BackupSection<'a> {
    #[serde(rename = "caseUrl")]
    case_url: &'a str,
    banned: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires: Option<String>,
    ign: &'a str,
    lengthofban: &'a str,
    reason: &'a str,
}

impl<'a> From<&'a BanRecord> for BackupSection<'a> {
    fn from(record: &'a BanRecord) -> Self {
        Self {
            case_url: &record.case_reference,
            banned: &record.banned_at,
            expires: record.expires_at.map(format_backup_date),
            ign: &record.ign,
            lengthofban: &record.ban_duration,
            reason: &record.reason,
        }
    }
}

/// File-backed record store.
pub struct BackupStore {
    path: PathBuf,
}

impl BackupStore {
    /// Open the backup at `path`, creating an empty file if there is none.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        if !path.exists() {
            OpenOptions::new().create(true).append(true).open(&path)?;
            info!(path = %path.display(), "created empty backup file");
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse backup file contents.
    pub fn parse(raw: &str) -> Result<ParseOutcome, StoreError> {
        let document: Table = toml::from_str(raw)?;

        let mut outcome = ParseOutcome::default();
        for (index, (key, value)) in document.iter().enumerate() {
            let row = index + 1;
            match parse_section(key, value) {
                Ok((record, degraded)) => {
                    if let Some(raw) = degraded {
                        outcome.diagnostics.push(Diagnostic {
                            row,
                            kind: DiagnosticKind::DateDegraded {
                                identity: record.identity,
                                raw,
                            },
                        });
                    }
                    outcome.accept(row, record);
                }
                Err(err) => outcome.skip(row, err),
            }
        }
        Ok(outcome)
    }

    /// Render `records` as backup file contents, ordered by identity.
    pub fn render(records: &RecordSet) -> Result<String, StoreError> {
        let sections: BTreeMap<String, BackupSection<'_>> = records
            .iter()
            .map(|record| (record.identity.to_string(), BackupSection::from(record)))
            .collect();
        Ok(toml::to_string(&sections)?)
    }
}

#[async_trait::async_trait]
impl RecordStore for BackupStore {
    fn name(&self) -> &'static str {
        "backup"
    }

    async fn load(&self) -> Result<ParseOutcome, StoreError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)
                    .await?;
                warn!(path = %self.path.display(), "backup file was missing, recreated it empty");
                return Ok(ParseOutcome::default());
            }
            Err(e) => return Err(e.into()),
        };
        let outcome = Self::parse(&raw)?;
        debug!(path = %self.path.display(), count = outcome.records.len(), "read backup file");
        Ok(outcome)
    }

    async fn save(&self, records: &RecordSet) -> Result<(), StoreError> {
        let contents = Self::render(records)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomically(&path, contents.as_bytes()))
            .await
            .map_err(|e| StoreError::Other(format!("backup writer panicked: {e}")))??;
        debug!(path = %self.path.display(), count = records.len(), "wrote backup file");
        Ok(())
    }
}

/// Write to a sibling temp file, then rename over `path`.
fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}

/// Returns the record and, when the expiry could not be read, its raw text.
fn parse_section(key: &str, value: &Value) -> Result<(BanRecord, Option<String>), RowError> {
    let identity = parse_identity(key)?;
    let Value::Table(section) = value else {
        return Err(RowError::WrongType {
            key: key.to_string(),
            expected: "a table",
            found: value.type_str(),
        });
    };

    let (expires_at, degraded) = match section.get(EXPIRES_KEY) {
        None => (None, None),
        Some(Value::String(raw)) if raw.trim().is_empty() => (None, None),
        Some(Value::String(raw)) => match parse_backup_date(raw) {
            Some(date) => (Some(date), None),
            None => (None, Some(raw.clone())),
        },
        Some(other) => {
            return Err(RowError::WrongType {
                key: format!("{key}.{EXPIRES_KEY}"),
                expected: "a string",
                found: other.type_str(),
            });
        }
    };

    let record = BanRecord {
        identity,
        case_reference: section_text(section, key, CASE_URL_KEY)?,
        banned_at: section_text(section, key, BANNED_KEY)?,
        ban_duration: section_text(section, key, LENGTH_OF_BAN_KEY)?,
        reason: section_text(section, key, REASON_KEY)?,
        ign: section_text(section, key, IGN_KEY)?,
        expires_at,
    };
    Ok((record, degraded))
}

fn section_text(section: &Table, key: &str, field: &str) -> Result<String, RowError> {
    match section.get(field) {
        None => Err(RowError::MissingField(format!("{key}.{field}"))),
        Some(Value::String(text)) => Ok(text.clone()),
        Some(other) => Err(RowError::WrongType {
            key: format!("{key}.{field}"),
            expected: "a string",
            found: other.type_str(),
        }),
    }
}
