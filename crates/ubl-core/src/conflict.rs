//! Conflict resolution between two records for the same identity.
//!
//! Rules, in order:
//!
//! 1. No existing record: insert.
//! 2. Existing record is indefinite: keep it. Indefinite bans are never overridden.
//! 3. Candidate is indefinite: replace.
//! 4. Both dated: the later expiry wins. A tie keeps the existing record.

use std::cmp::Ordering;
use std::fmt;

use crate::record::BanRecord;

/// Outcome of resolving a candidate against the current holder of its identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// No record existed; the candidate was added.
    Inserted,
    /// The candidate won and displaced the existing record.
    Replaced,
    /// The existing record won; the candidate was discarded.
    KeptExisting,
}

impl Resolution {
    /// True when the candidate collided with an existing record.
    pub fn is_conflict(&self) -> bool {
        !matches!(self, Self::Inserted)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Inserted => "inserted",
            Self::Replaced => "kept new record",
            Self::KeptExisting => "kept existing record",
        })
    }
}

/// Decide which of `existing` and `candidate` survives.
pub fn resolve(existing: Option<&BanRecord>, candidate: &BanRecord) -> Resolution {
    let Some(existing) = existing else {
        return Resolution::Inserted;
    };

    match (existing.expires_at, candidate.expires_at) {
        (None, _) => Resolution::KeptExisting,
        (Some(_), None) => Resolution::Replaced,
        (Some(current), Some(incoming)) => match incoming.cmp(&current) {
            Ordering::Greater => Resolution::Replaced,
            Ordering::Less | Ordering::Equal => Resolution::KeptExisting,
        },
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::record::tests::record;

    const ID: &str = "c0b075fa-049d-49ec-879e-45e5f0e66b08";

    fn day(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn nothing_to_conflict_with() {
        assert_eq!(resolve(None, &record(ID, day(2017, 1, 1))), Resolution::Inserted);
        assert!(!Resolution::Inserted.is_conflict());
    }

    #[test]
    fn indefinite_existing_is_never_overridden() {
        let existing = record(ID, None);
        assert_eq!(
            resolve(Some(&existing), &record(ID, day(2099, 1, 1))),
            Resolution::KeptExisting
        );
        assert_eq!(resolve(Some(&existing), &record(ID, None)), Resolution::KeptExisting);
    }

    #[test]
    fn indefinite_candidate_wins_over_dated() {
        let existing = record(ID, day(2099, 1, 1));
        assert_eq!(resolve(Some(&existing), &record(ID, None)), Resolution::Replaced);
    }

    #[test]
    fn later_expiry_wins_in_either_order() {
        let early = record(ID, day(2017, 3, 1));
        let late = record(ID, day(2017, 9, 1));
        assert_eq!(resolve(Some(&early), &late), Resolution::Replaced);
        assert_eq!(resolve(Some(&late), &early), Resolution::KeptExisting);
    }

    #[test]
    fn tie_keeps_first_seen() {
        let first = record(ID, day(2017, 3, 1));
        let mut second = record(ID, day(2017, 3, 1));
        second.reason = "different".into();
        let resolution = resolve(Some(&first), &second);
        assert_eq!(resolution, Resolution::KeptExisting);
        assert!(resolution.is_conflict());
    }
}
