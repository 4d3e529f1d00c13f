//! Parser for the spreadsheet list feed.
//!
//! The live feed is JSON shaped like
//!
//! ```text
//! { "feed": { "entry": [ { "gsx$uuid": { "$t": "..." }, ... }, ... ] } }
//! ```
//!
//! A wrong top-level shape fails the whole parse. Anything wrong inside a
//! single row only drops that row and records a [`Diagnostic`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::date::parse_expiry;
use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::identity::parse_identity;
use crate::record::{BanRecord, RecordSet};

const COLUMN_PREFIX: &str = "gsx$";
const CELL_TEXT_KEY: &str = "$t";

/// Default strftime pattern for feed expiry dates, applied after normalisation.
pub const DEFAULT_DATE_FORMAT: &str = "%B%d%Y";

/// The whole document is unusable.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unable to parse JSON, not in valid format: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected {path} to be {expected}, found {found} instead")]
    WrongType {
        path: &'static str,
        expected: &'static str,
        found: &'static str,
    },
    #[error("expected key `{0}` but it was not found")]
    MissingKey(&'static str),
}

/// A single row is unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    #[error("expected entry item to be an object, found {0} instead")]
    NotAnObject(&'static str),
    #[error("expected entry key `{0}` but it was not found")]
    MissingField(String),
    #[error("expected entry key `{key}` to be {expected}, found {found} instead")]
    WrongType {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error(transparent)]
    InvalidIdentity(#[from] crate::identity::IdentityError),
}

/// Logical field → feed column key (without the `gsx$` prefix).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ColumnNameMapping {
    pub case_url: String,
    pub date_banned: String,
    pub expiry_date: String,
    pub ign: String,
    pub length_of_ban: String,
    pub reason: String,
    pub uuid: String,
}

impl Default for ColumnNameMapping {
    fn default() -> Self {
        Self {
            case_url: "caseurl".into(),
            date_banned: "datebanned".into(),
            expiry_date: "expirydate".into(),
            ign: "ign".into(),
            length_of_ban: "lengthofban".into(),
            reason: "reason".into(),
            uuid: "uuid".into(),
        }
    }
}

/// Records plus every diagnostic raised while building them.
#[derive(Debug, Default)]
pub struct ParseOutcome {
    pub records: RecordSet,
    pub diagnostics: Vec<Diagnostic>,
}

impl ParseOutcome {
    pub fn skipped(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_skip()).count()
    }

    /// Resolve `record` into the set, noting a conflict if there was one.
    pub fn accept(&mut self, row: usize, record: BanRecord) {
        let identity = record.identity;
        let resolution = self.records.insert_resolved(record);
        if resolution.is_conflict() {
            let kept_expiry = self.records.get(&identity).and_then(|r| r.expires_at);
            self.diagnostics.push(Diagnostic {
                row,
                kind: DiagnosticKind::Conflict {
                    identity,
                    resolution,
                    kept_expiry,
                },
            });
        }
    }

    pub fn skip(&mut self, row: usize, error: RowError) {
        self.diagnostics.push(Diagnostic {
            row,
            kind: DiagnosticKind::Skipped(error),
        });
    }
}

/// Converts a feed document into a [`RecordSet`].
///
/// Pure: no I/O, no state between calls.
#[derive(Debug, Clone)]
pub struct FeedParser {
    columns: ColumnNameMapping,
    date_format: String,
    header_rows: usize,
}

impl FeedParser {
    pub fn new(columns: ColumnNameMapping, date_format: impl Into<String>, header_rows: usize) -> Self {
        Self {
            columns,
            date_format: date_format.into(),
            header_rows,
        }
    }

    /// Parse a raw feed document.
    pub fn parse(&self, raw: &str) -> Result<ParseOutcome, ParseError> {
        let document: Value = serde_json::from_str(raw)?;
        let entries = entry_list(&document)?;

        let mut outcome = ParseOutcome::default();
        for (index, entry) in entries
            .iter()
            .filter(|e| !e.is_null())
            .skip(self.header_rows)
            .enumerate()
        {
            let row = index + 1;
            match self.parse_row(entry) {
                Ok((record, raw_expiry)) => {
                    if record.expires_at.is_none() {
                        outcome.diagnostics.push(Diagnostic {
                            row,
                            kind: DiagnosticKind::DateDegraded {
                                identity: record.identity,
                                raw: raw_expiry,
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

    /// Parse one entry, returning the record and its raw expiry text.
    fn parse_row(&self, entry: &Value) -> Result<(BanRecord, String), RowError> {
        let Value::Object(cells) = entry else {
            return Err(RowError::NotAnObject(type_name(entry)));
        };

        let columns = &self.columns;
        let case_reference = cell_text(cells, &columns.case_url)?;
        let banned_at = cell_text(cells, &columns.date_banned)?;
        let ign = cell_text(cells, &columns.ign)?;
        let ban_duration = cell_text(cells, &columns.length_of_ban)?;
        let reason = cell_text(cells, &columns.reason)?;
        let identity = parse_identity(&cell_text(cells, &columns.uuid)?)?;
        let raw_expiry = cell_text(cells, &columns.expiry_date)?;
        let expires_at = parse_expiry(&raw_expiry, &self.date_format);

        let record = BanRecord {
            identity,
            case_reference,
            banned_at,
            ban_duration,
            reason,
            ign,
            expires_at,
        };
        Ok((record, raw_expiry))
    }
}

fn entry_list(document: &Value) -> Result<&Vec<Value>, ParseError> {
    let Value::Object(outer) = document else {
        return Err(ParseError::WrongType {
            path: "document",
            expected: "an object",
            found: type_name(document),
        });
    };
    let feed = outer.get("feed").ok_or(ParseError::MissingKey("feed"))?;
    let Value::Object(feed) = feed else {
        return Err(ParseError::WrongType {
            path: "`feed`",
            expected: "an object",
            found: type_name(feed),
        });
    };
    let entries = feed.get("entry").ok_or(ParseError::MissingKey("feed.entry"))?;
    match entries {
        Value::Array(list) => Ok(list),
        other => Err(ParseError::WrongType {
            path: "`feed.entry`",
            expected: "an array",
            found: type_name(other),
        }),
    }
}

/// Trimmed `$t` text of column `gsx$<key>`.
fn cell_text(cells: &Map<String, Value>, key: &str) -> Result<String, RowError> {
    let column = format!("{COLUMN_PREFIX}{key}");
    let cell = match cells.get(&column) {
        None => return Err(RowError::MissingField(column)),
        Some(Value::Object(cell)) => cell,
        Some(other) => {
            return Err(RowError::WrongType {
                key: column,
                expected: "an object",
                found: type_name(other),
            });
        }
    };
    match cell.get(CELL_TEXT_KEY) {
        None => Err(RowError::MissingField(format!("{column}.{CELL_TEXT_KEY}"))),
        Some(Value::String(text)) => Ok(text.trim().to_string()),
        Some(other) => Err(RowError::WrongType {
            key: format!("{column}.{CELL_TEXT_KEY}"),
            expected: "a string",
            found: type_name(other),
        }),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
