//! Record stores: the capability both the live feed and the local backup provide.

mod backup;
mod error;

pub use backup::BackupStore;
pub use error::StoreError;

use ubl_core::{ParseOutcome, RecordSet};

/// A source that can produce a full record set, and possibly persist one.
///
/// Implementations fail independently; a failed `load` or `save` never leaves
/// partial state behind.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &'static str;

    /// Read every record. Row-level problems come back as diagnostics.
    async fn load(&self) -> Result<ParseOutcome, StoreError>;

    /// Replace the stored records with `records`.
    async fn save(&self, records: &RecordSet) -> Result<(), StoreError>;
}
