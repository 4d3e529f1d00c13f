//! Owner of the published snapshot.
//!
//! `SyncCoordinator` loads from the backup and live stores, publishes each
//! successful load as a fresh immutable [`Snapshot`], and mirrors live loads
//! into the backup. Readers call [`snapshot`](SyncCoordinator::snapshot),
//! which is a lock-free pointer load.
//!
//! Loads are serialised by an async mutex. A scheduled tick that finds a
//! refresh already running is skipped rather than queued.
//!
//! Hosts that need to react to new live data (kicking connected players
//! who were just added) hold a [`subscribe`](SyncCoordinator::subscribe)
//! receiver.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use ubl_core::{ParseOutcome, Snapshot};
use ubl_store::{RecordStore, StoreError};

/// Shortest period [`SyncCoordinator::start`] will schedule.
pub const MIN_REFRESH_PERIOD: Duration = Duration::from_secs(1);

/// Summary of one successful load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    pub records: usize,
    pub skipped: usize,
    pub diagnostics: usize,
}

impl LoadReport {
    fn from_outcome(outcome: &ParseOutcome) -> Self {
        Self {
            records: outcome.records.len(),
            skipped: outcome.skipped(),
            diagnostics: outcome.diagnostics.len(),
        }
    }
}

pub struct SyncCoordinator {
    live: Arc<dyn RecordStore>,
    backup: Arc<dyn RecordStore>,
    current: ArcSwap<Snapshot>,
    load_lock: Mutex<()>,
    refreshed: watch::Sender<Arc<Snapshot>>,
}

impl SyncCoordinator {
    pub fn new(live: Arc<dyn RecordStore>, backup: Arc<dyn RecordStore>) -> Self {
        Self {
            live,
            backup,
            current: ArcSwap::from_pointee(Snapshot::uninitialized()),
            load_lock: Mutex::new(()),
            refreshed: watch::Sender::new(Arc::new(Snapshot::uninitialized())),
        }
    }

    /// The most recently published snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Receiver that is marked changed after every successful live refresh.
    /// Backup loads do not notify.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.refreshed.subscribe()
    }

    pub fn is_initialized(&self) -> bool {
        self.current.load().initialized
    }

    /// Load from the backup store and publish on success.
    ///
    /// Failure leaves the current snapshot untouched. The backup is not
    /// written back.
    pub async fn load_backup(&self) -> Result<LoadReport, StoreError> {
        let _guard = self.load_lock.lock().await;
        info!("loading UBL from backup data");
        match self.backup.load().await {
            Ok(outcome) => {
                let report = self.publish(self.backup.name(), outcome);
                info!(
                    records = report.records,
                    skipped = report.skipped,
                    diagnostics = report.diagnostics,
                    "backup UBL loaded"
                );
                Ok(report)
            }
            Err(err) => {
                error!(error = %err, "failed to load from backup UBL");
                Err(err)
            }
        }
    }

    /// Load from the live store, publish, then persist to the backup.
    ///
    /// A failed fetch or parse leaves the current snapshot untouched. A failed
    /// backup write is logged and does not undo the publish.
    pub async fn refresh(&self) -> Result<LoadReport, StoreError> {
        let guard = self.load_lock.lock().await;
        self.refresh_locked(guard).await
    }

    /// Like [`refresh`](Self::refresh) but returns `None` without doing
    /// anything if another load holds the lock.
    pub async fn try_refresh(&self) -> Option<Result<LoadReport, StoreError>> {
        let guard = self.load_lock.try_lock().ok()?;
        Some(self.refresh_locked(guard).await)
    }

    async fn refresh_locked(&self, _guard: tokio::sync::MutexGuard<'_, ()>) -> Result<LoadReport, StoreError> {
        info!("starting load of UBL from live data");
        let outcome = match self.live.load().await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(error = %err, "failed to load from live UBL");
                return Err(err);
            }
        };

        let report = self.publish(self.live.name(), outcome);
        info!(
            records = report.records,
            skipped = report.skipped,
            diagnostics = report.diagnostics,
            "live UBL data loaded"
        );

        let snapshot = self.snapshot();
        self.refreshed.send_replace(Arc::clone(&snapshot));
        info!("saving current UBL to backup file");
        match self.backup.save(&snapshot.records).await {
            Ok(()) => info!("backup completed"),
            Err(err) => error!(error = %err, "failed to save backup UBL"),
        }
        Ok(report)
    }

    fn publish(&self, source: &'static str, outcome: ParseOutcome) -> LoadReport {
        for diagnostic in &outcome.diagnostics {
            diagnostic.log(source);
        }
        let report = LoadReport::from_outcome(&outcome);
        self.current.store(Arc::new(Snapshot::ready(outcome.records)));
        report
    }

    /// Refresh now and then every `period` until the returned handle is
    /// stopped or dropped.
    ///
    /// Each tick runs in its own task so a slow refresh does not delay the
    /// schedule; overlapping ticks are skipped. Periods shorter than
    /// [`MIN_REFRESH_PERIOD`] are raised to it.
    pub fn start(self: &Arc<Self>, period: Duration) -> RefreshSchedule {
        let period = if period < MIN_REFRESH_PERIOD {
            warn!(requested_ms = period.as_millis() as u64, "refresh period too short, using minimum");
            MIN_REFRESH_PERIOD
        } else {
            period
        };
        let coordinator = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let coordinator = Arc::clone(&coordinator);
                tokio::spawn(async move {
                    if coordinator.try_refresh().await.is_none() {
                        warn!("previous refresh still running, skipping scheduled refresh");
                    }
                });
            }
        });
        info!(period_secs = period.as_secs(), "scheduled UBL refresh");
        RefreshSchedule { handle }
    }
}

/// Handle to the repeating refresh task. Dropping it cancels the schedule.
pub struct RefreshSchedule {
    handle: JoinHandle<()>,
}

impl RefreshSchedule {
    pub fn stop(self) {
        self.handle.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for RefreshSchedule {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use chrono::NaiveDate;
    use ubl_core::{BanRecord, RecordSet};
    use ubl_store::BackupStore;
    use uuid::Uuid;

    use super::*;

    const ID_A: &str = "c0b075fa-049d-49ec-879e-45e5f0e66b08";
    const ID_B: &str = "069a79f4-44e9-4726-a5be-fca90e38aaf5";

    fn record(identity: &str) -> BanRecord {
        BanRecord {
            identity: Uuid::parse_str(identity).unwrap(),
            case_reference: "https://redd.it/abc123".into(),
            banned_at: "January 1, 2017".into(),
            ban_duration: "30 days".into(),
            reason: "Xray".into(),
            ign: "Notch".into(),
            expires_at: NaiveDate::from_ymd_opt(2099, 1, 1),
        }
    }

    fn set_of(identities: &[&str]) -> RecordSet {
        let mut set = RecordSet::new();
        for identity in identities {
            set.insert_resolved(record(identity));
        }
        set
    }

    /// In-memory store whose next load can be made to fail.
    #[derive(Default)]
    struct FakeStore {
        records: std::sync::Mutex<RecordSet>,
        fail_load: AtomicBool,
        fail_save: AtomicBool,
        saves: AtomicUsize,
        delay: Option<Duration>,
    }

    impl FakeStore {
        fn with(records: RecordSet) -> Self {
            Self {
                records: std::sync::Mutex::new(records),
                ..Self::default()
            }
        }

        fn set_records(&self, records: RecordSet) {
            *self.records.lock().unwrap() = records;
        }
    }

    #[async_trait::async_trait]
    impl RecordStore for FakeStore {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn load(&self) -> Result<ParseOutcome, StoreError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_load.load(Ordering::SeqCst) {
                return Err(StoreError::Other("feed unavailable".into()));
            }
            Ok(ParseOutcome {
                records: self.records.lock().unwrap().clone(),
                diagnostics: Vec::new(),
            })
        }

        async fn save(&self, records: &RecordSet) -> Result<(), StoreError> {
            if self.fail_save.load(Ordering::SeqCst) {
                return Err(StoreError::Other("disk full".into()));
            }
            self.saves.fetch_add(1, Ordering::SeqCst);
            self.set_records(records.clone());
            Ok(())
        }
    }

    fn coordinator(live: &Arc<FakeStore>, backup: &Arc<FakeStore>) -> Arc<SyncCoordinator> {
        Arc::new(SyncCoordinator::new(live.clone(), backup.clone()))
    }

    #[tokio::test]
    async fn starts_uninitialized() {
        let live = Arc::new(FakeStore::default());
        let backup = Arc::new(FakeStore::default());
        let sync = coordinator(&live, &backup);
        assert!(!sync.is_initialized());
        assert!(sync.snapshot().records.is_empty());
    }

    #[tokio::test]
    async fn backup_load_initializes_without_writing_back() {
        let live = Arc::new(FakeStore::default());
        let backup = Arc::new(FakeStore::with(set_of(&[ID_A])));
        let sync = coordinator(&live, &backup);

        let report = sync.load_backup().await.unwrap();
        assert_eq!(report.records, 1);
        assert!(sync.is_initialized());
        assert_eq!(backup.saves.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_backup_leaves_state_alone() {
        let live = Arc::new(FakeStore::default());
        let backup = Arc::new(FakeStore::default());
        backup.fail_load.store(true, Ordering::SeqCst);
        let sync = coordinator(&live, &backup);

        assert!(sync.load_backup().await.is_err());
        assert!(!sync.is_initialized());
    }

    #[tokio::test]
    async fn refresh_publishes_and_persists() {
        let live = Arc::new(FakeStore::with(set_of(&[ID_A, ID_B])));
        let backup = Arc::new(FakeStore::default());
        let sync = coordinator(&live, &backup);

        let report = sync.refresh().await.unwrap();
        assert_eq!(report.records, 2);
        assert!(sync.is_initialized());
        assert_eq!(sync.snapshot().records.len(), 2);
        assert_eq!(backup.saves.load(Ordering::SeqCst), 1);
        assert_eq!(*backup.records.lock().unwrap(), set_of(&[ID_A, ID_B]));
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_snapshot_and_initialized() {
        let live = Arc::new(FakeStore::with(set_of(&[ID_A])));
        let backup = Arc::new(FakeStore::default());
        let sync = coordinator(&live, &backup);
        sync.refresh().await.unwrap();
        let before = sync.snapshot();

        live.fail_load.store(true, Ordering::SeqCst);
        assert!(sync.refresh().await.is_err());
        assert!(sync.is_initialized());
        assert!(Arc::ptr_eq(&before, &sync.snapshot()));
        assert_eq!(backup.saves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_refresh_before_any_load_stays_uninitialized() {
        let live = Arc::new(FakeStore::default());
        live.fail_load.store(true, Ordering::SeqCst);
        let backup = Arc::new(FakeStore::default());
        let sync = coordinator(&live, &backup);

        assert!(sync.refresh().await.is_err());
        assert!(!sync.is_initialized());
    }

    #[tokio::test]
    async fn backup_failure_does_not_undo_live_publish() {
        let live = Arc::new(FakeStore::with(set_of(&[ID_A])));
        let backup = Arc::new(FakeStore::default());
        backup.fail_save.store(true, Ordering::SeqCst);
        let sync = coordinator(&live, &backup);

        assert!(sync.refresh().await.is_ok());
        assert!(sync.snapshot().records.contains(&Uuid::parse_str(ID_A).unwrap()));
    }

    #[tokio::test]
    async fn old_snapshots_are_not_mutated_by_refresh() {
        let live = Arc::new(FakeStore::with(set_of(&[ID_A])));
        let backup = Arc::new(FakeStore::default());
        let sync = coordinator(&live, &backup);
        sync.refresh().await.unwrap();
        let held = sync.snapshot();

        live.set_records(set_of(&[ID_B]));
        sync.refresh().await.unwrap();

        assert!(held.records.contains(&Uuid::parse_str(ID_A).unwrap()));
        assert!(!held.records.contains(&Uuid::parse_str(ID_B).unwrap()));
        let fresh = sync.snapshot();
        assert!(fresh.records.contains(&Uuid::parse_str(ID_B).unwrap()));
        assert!(!fresh.records.contains(&Uuid::parse_str(ID_A).unwrap()));
    }

    #[tokio::test]
    async fn try_refresh_skips_while_busy() {
        let live = Arc::new(FakeStore {
            delay: Some(Duration::from_millis(200)),
            ..FakeStore::with(set_of(&[ID_A]))
        });
        let backup = Arc::new(FakeStore::default());
        let sync = coordinator(&live, &backup);

        let running = {
            let sync = Arc::clone(&sync);
            tokio::spawn(async move { sync.refresh().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(sync.try_refresh().await.is_none());
        assert!(running.await.unwrap().is_ok());
        assert!(sync.try_refresh().await.is_some());
    }

    #[tokio::test]
    async fn schedule_refreshes_immediately() {
        let live = Arc::new(FakeStore::with(set_of(&[ID_A])));
        let backup = Arc::new(FakeStore::default());
        let sync = coordinator(&live, &backup);

        let schedule = sync.start(Duration::from_secs(3600));
        for _ in 0..100 {
            if sync.is_initialized() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(sync.is_initialized());
        assert!(schedule.is_running());
        schedule.stop();
    }

    #[tokio::test]
    async fn zero_period_is_clamped() {
        let live = Arc::new(FakeStore::with(set_of(&[ID_A])));
        let backup = Arc::new(FakeStore::default());
        let sync = coordinator(&live, &backup);

        let schedule = sync.start(Duration::ZERO);
        for _ in 0..100 {
            if sync.is_initialized() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(sync.is_initialized());
        assert!(schedule.is_running());
    }

    #[tokio::test]
    async fn subscribers_see_live_refreshes_only() {
        let live = Arc::new(FakeStore::with(set_of(&[ID_A])));
        let backup = Arc::new(FakeStore::with(set_of(&[ID_B])));
        let sync = coordinator(&live, &backup);
        let mut rx = sync.subscribe();

        sync.load_backup().await.unwrap();
        assert!(!rx.has_changed().unwrap());

        sync.refresh().await.unwrap();
        assert!(rx.has_changed().unwrap());
        let published = rx.borrow_and_update().clone();
        assert!(Arc::ptr_eq(&published, &sync.snapshot()));
        assert!(published.records.contains(&Uuid::parse_str(ID_A).unwrap()));

        live.fail_load.store(true, Ordering::SeqCst);
        assert!(sync.refresh().await.is_err());
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn report_counts_skipped_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ubl-backup.toml");
        std::fs::write(
            &path,
            format!(
                "[not-a-uuid]\ncaseUrl = \"x\"\n\n{}",
                BackupStore::render(&set_of(&[ID_A])).unwrap()
            ),
        )
        .unwrap();
        let live = Arc::new(FakeStore::default());
        let sync = SyncCoordinator::new(live, Arc::new(BackupStore::new(&path).unwrap()));

        let report = sync.load_backup().await.unwrap();
        assert_eq!(report.records, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.diagnostics, 1);
    }

    #[tokio::test]
    async fn end_to_end_with_backup_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ubl-backup.toml");
        let live = Arc::new(FakeStore::with(set_of(&[ID_A, ID_B])));

        let first = SyncCoordinator::new(live.clone(), Arc::new(BackupStore::new(&path).unwrap()));
        first.refresh().await.unwrap();

        // A fresh process with the feed down still comes up from the backup.
        live.fail_load.store(true, Ordering::SeqCst);
        let second = SyncCoordinator::new(live.clone(), Arc::new(BackupStore::new(&path).unwrap()));
        second.load_backup().await.unwrap();
        assert!(second.refresh().await.is_err());
        assert!(second.is_initialized());
        assert_eq!(*second.snapshot().records, set_of(&[ID_A, ID_B]));
    }
}
