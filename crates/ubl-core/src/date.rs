//! Expiry date normalisation for operator-entered dates.
//!
//! Feed dates are typed by hand, so spelling and punctuation drift:
//! "Janurary 5, 2017", "March 15 2017", "April-03-2017". Before parsing with
//! the configured pattern every date goes through a fixed rule table:
//!
//! 1. Known month misspellings are corrected (case-insensitive).
//! 2. Everything that is not an ASCII letter or digit is stripped.
//!
//! The default pattern `%B%d%Y` then matches the stripped form
//! (`March152017`). An unparseable date is not an error for the row; the
//! caller treats it as indefinite.

use chrono::NaiveDate;

use crate::text::replace_ignore_ascii_case;

/// Pattern the backup file uses for expiry dates.
pub const BACKUP_DATE_FORMAT: &str = "%Y-%m-%d";

/// Misspelling → correction. Applied before punctuation stripping.
const MONTH_CORRECTIONS: &[(&str, &str)] = &[("Janurary", "January"), ("Feburary", "February")];

/// Apply the misspelling table and strip non-alphanumerics.
pub fn normalize_date(raw: &str) -> String {
    let corrected = MONTH_CORRECTIONS
        .iter()
        .fold(raw.to_string(), |acc, (wrong, right)| {
            replace_ignore_ascii_case(&acc, wrong, right)
        });
    corrected.chars().filter(char::is_ascii_alphanumeric).collect()
}

/// Normalise `raw` and parse it with `format`.
///
/// Returns `None` when the normalised string does not match.
pub fn parse_expiry(raw: &str, format: &str) -> Option<NaiveDate> {
    let normalized = normalize_date(raw);
    if normalized.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(&normalized, format).ok()
}

/// Parse a backup-file date (`YYYY-MM-DD`) without normalisation.
pub fn parse_backup_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), BACKUP_DATE_FORMAT).ok()
}

/// Render a date the way the backup file stores it.
pub fn format_backup_date(date: NaiveDate) -> String {
    date.format(BACKUP_DATE_FORMAT).to_string()
}
