//! Ban records and the identity-keyed record set.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::conflict::{Resolution, resolve};

/// One resolved ban entry.
///
/// Everything except `identity` and `expires_at` is informational text taken
/// straight from the feed (trimmed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BanRecord {
    pub identity: Uuid,
    pub case_reference: String,
    /// Free text describing when the ban was issued. Never parsed.
    pub banned_at: String,
    pub ban_duration: String,
    pub reason: String,
    /// In-game name at the time of the ban.
    pub ign: String,
    /// `None` means the ban never expires.
    pub expires_at: Option<NaiveDate>,
}

impl BanRecord {
    pub fn is_indefinite(&self) -> bool {
        self.expires_at.is_none()
    }
}

/// The authoritative identity → record mapping.
///
/// Holds at most one record per identity. New records go through
/// [`insert_resolved`](Self::insert_resolved), which applies the conflict
/// policy, so duplicates never make it into the set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSet {
    records: HashMap<Uuid, BanRecord>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `record`, resolving against any record already held for the
    /// same identity. Returns what the resolver decided.
    pub fn insert_resolved(&mut self, record: BanRecord) -> Resolution {
        let resolution = resolve(self.records.get(&record.identity), &record);
        match resolution {
            Resolution::Inserted | Resolution::Replaced => {
                self.records.insert(record.identity, record);
            }
            Resolution::KeptExisting => {}
        }
        resolution
    }

    pub fn get(&self, identity: &Uuid) -> Option<&BanRecord> {
        self.records.get(identity)
    }

    pub fn contains(&self, identity: &Uuid) -> bool {
        self.records.contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BanRecord> {
        self.records.values()
    }

    /// Records ordered by identity, for stable output.
    pub fn sorted(&self) -> Vec<&BanRecord> {
        let mut records: Vec<&BanRecord> = self.records.values().collect();
        records.sort_by_key(|r| r.identity);
        records
    }
}

/// An immutable point-in-time view published by the sync coordinator.
///
/// `initialized` is false only before the first successful load; the
/// coordinator never publishes an uninitialized snapshot after that.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub initialized: bool,
    pub records: Arc<RecordSet>,
}

impl Snapshot {
    /// The snapshot readers see before anything has loaded.
    pub fn uninitialized() -> Self {
        Self::default()
    }

    pub fn ready(records: RecordSet) -> Self {
        Self {
            initialized: true,
            records: Arc::new(records),
        }
    }
}
