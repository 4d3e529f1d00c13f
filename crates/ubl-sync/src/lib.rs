//! Sync layer: live feed fetcher, snapshot publication, refresh schedule.

pub mod coordinator;

#[cfg(feature = "http")]
pub mod http;

pub use coordinator::{LoadReport, RefreshSchedule, SyncCoordinator};

#[cfg(feature = "http")]
pub use http::{LiveFeedStore, SyncError};
