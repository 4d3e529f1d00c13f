//! Row-scoped notes produced while loading a record source.

use std::fmt;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::conflict::Resolution;
use crate::feed::RowError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// The row was dropped.
    Skipped(RowError),
    /// The expiry date did not parse; the record was kept as indefinite.
    DateDegraded { identity: Uuid, raw: String },
    /// The row collided with an earlier one for the same identity.
    Conflict {
        identity: Uuid,
        resolution: Resolution,
        kept_expiry: Option<NaiveDate>,
    },
}

/// A non-fatal note about one row.
///
/// `row` is 1-based and counts from the first row after any header rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub row: usize,
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    pub fn is_skip(&self) -> bool {
        matches!(self.kind, DiagnosticKind::Skipped(_))
    }

    /// Emit this diagnostic as a tracing event.
    pub fn log(&self, source: &str) {
        match &self.kind {
            DiagnosticKind::Skipped(_) => {
                tracing::warn!(source, row = self.row, "{self}");
            }
            DiagnosticKind::DateDegraded { .. } | DiagnosticKind::Conflict { .. } => {
                tracing::info!(source, row = self.row, "{self}");
            }
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DiagnosticKind::Skipped(err) => {
                write!(f, "skipping row number {}: {err}", self.row)
            }
            DiagnosticKind::DateDegraded { identity, raw } => write!(
                f,
                "unable to parse the date `{raw}` for {identity}, using 'forever' instead"
            ),
            DiagnosticKind::Conflict {
                identity,
                resolution,
                kept_expiry,
            } => {
                let expiry = kept_expiry.map_or_else(|| "forever".to_string(), |d| d.to_string());
                write!(
                    f,
                    "duplicate entry for {identity} at row {}, {resolution} (expires {expiry})",
                    self.row
                )
            }
        }
    }
}
