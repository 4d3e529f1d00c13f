//! Access decisions against a published snapshot.
//!
//! `decide` is a hash lookup plus template substitution. It never touches the
//! network or disk, so it is safe on the login path.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::date::format_backup_date;
use crate::record::{BanRecord, Snapshot};
use crate::text::replace_ignore_ascii_case;

/// Rendered in place of `{{expires}}` for indefinite bans.
pub const INDEFINITE_TOKEN: &str = "forever";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// Nothing has loaded yet. Carries the waiting message.
    DenyNotReady(String),
    /// Banned. Carries the rendered ban message.
    Deny(String),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Message to show a denied caller.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Allow => None,
            Self::DenyNotReady(msg) | Self::Deny(msg) => Some(msg),
        }
    }
}

/// Message templates and exclusions applied on every access check.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    waiting_message: String,
    banned_message: String,
    exclusions: HashSet<Uuid>,
}

impl AccessPolicy {
    pub fn new(
        waiting_message: impl Into<String>,
        banned_message: impl Into<String>,
        exclusions: HashSet<Uuid>,
    ) -> Self {
        Self {
            waiting_message: waiting_message.into(),
            banned_message: banned_message.into(),
            exclusions,
        }
    }

    pub fn is_excluded(&self, identity: &Uuid) -> bool {
        self.exclusions.contains(identity)
    }

    pub fn decide(&self, identity: &Uuid, snapshot: &Snapshot, now: DateTime<Utc>) -> Decision {
        if !snapshot.initialized {
            return Decision::DenyNotReady(self.waiting_message.clone());
        }
        if self.is_excluded(identity) {
            return Decision::Allow;
        }
        let Some(record) = snapshot.records.get(identity) else {
            return Decision::Allow;
        };
        if has_lapsed(record, now) {
            return Decision::Allow;
        }
        Decision::Deny(self.render(record))
    }

    /// Every identity in `identities` that the snapshot now denies, with its
    /// ban message. Used after a refresh to find connected players who have
    /// just been added.
    ///
    /// An uninitialized snapshot yields nothing; the waiting message only
    /// applies to new connections.
    pub fn sweep<'a, I>(&self, identities: I, snapshot: &Snapshot, now: DateTime<Utc>) -> Vec<(Uuid, String)>
    where
        I: IntoIterator<Item = &'a Uuid>,
    {
        if !snapshot.initialized {
            return Vec::new();
        }
        identities
            .into_iter()
            .filter_map(|identity| match self.decide(identity, snapshot, now) {
                Decision::Deny(message) => Some((*identity, message)),
                Decision::Allow | Decision::DenyNotReady(_) => None,
            })
            .collect()
    }

    /// Substitute the six placeholders, case-insensitively.
    pub fn render(&self, record: &BanRecord) -> String {
        let expires = record
            .expires_at
            .map_or_else(|| INDEFINITE_TOKEN.to_string(), format_backup_date);

        [
            ("{{caseUrl}}", record.case_reference.as_str()),
            ("{{banned}}", record.banned_at.as_str()),
            ("{{lengthOfBan}}", record.ban_duration.as_str()),
            ("{{expires}}", expires.as_str()),
            ("{{reason}}", record.reason.as_str()),
            ("{{ign}}", record.ign.as_str()),
        ]
        .into_iter()
        .fold(self.banned_message.clone(), |message, (placeholder, value)| {
            replace_ignore_ascii_case(&message, placeholder, value)
        })
    }
}

/// A dated ban lapses once its expiry day has started (UTC).
fn has_lapsed(record: &BanRecord, now: DateTime<Utc>) -> bool {
    record
        .expires_at
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .is_some_and(|start| start.and_utc() < now)
}
