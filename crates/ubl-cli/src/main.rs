mod display;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use ubl_core::{UblConfig, parse_identity};
use ubl_store::{BackupStore, RecordStore};
use ubl_sync::{LiveFeedStore, SyncCoordinator};
use uuid::Uuid;

const REFRESH_OK: &str = "UBL refreshed";
const REFRESH_FAILED: &str = "Failed to refresh UBL, check console for more information";

#[derive(Parser)]
#[command(name = "ubl", version, about = "Universal ban list sync and access checks")]
struct Cli {
    /// Path to the TOML configuration file. Created with defaults if missing.
    #[arg(short, long, env = "UBL_CONFIG", default_value = "ubl.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decide access for one or more identities
    Check {
        /// Hyphenated or bare-hex UUIDs
        #[arg(required = true)]
        identities: Vec<String>,
        /// Answer from the backup only, without fetching the live feed
        #[arg(long)]
        offline: bool,
    },
    /// Fetch the live feed once and update the backup
    Refresh,
    /// Load the backup, then refresh on the configured schedule until interrupted
    Watch {
        /// Connected identities to re-check after every live refresh
        #[arg(long, value_delimiter = ',')]
        online: Vec<String>,
    },
    /// Print the records currently held
    Show {
        /// Fetch from the live feed instead of reading the backup
        #[arg(long)]
        live: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = UblConfig::load(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), config = %cli.config.display(), "ubl starting");

    let live = Arc::new(
        LiveFeedStore::new(
            &config.spreadsheet_id,
            &config.worksheet_id,
            config.feed_parser(),
            config.fetch_timeout(),
        )
        .context("building live feed client")?,
    );
    let backup = Arc::new(BackupStore::new(&config.backup_file).context("opening backup file")?);

    match cli.command {
        Command::Check { identities, offline } => {
            let identities = parse_identities(&identities)?;

            let sync = SyncCoordinator::new(live, backup);
            // Failures are already logged; the decision reflects whatever loaded.
            let _ = sync.load_backup().await;
            if !offline {
                let _ = sync.refresh().await;
            }

            let policy = config.access_policy();
            let snapshot = sync.snapshot();
            let now = chrono::Utc::now();
            for identity in &identities {
                display::print_decision(identity, &policy.decide(identity, &snapshot, now));
            }
        }
        Command::Refresh => {
            let sync = Arc::new(SyncCoordinator::new(live, backup));
            let task = tokio::spawn(async move { sync.refresh().await.ok() });
            match task.await.context("refresh task failed")? {
                Some(report) => println!(
                    "{REFRESH_OK} ({} records, {} rows skipped)",
                    report.records, report.skipped
                ),
                None => println!("{REFRESH_FAILED}"),
            }
        }
        Command::Watch { online } => {
            let online = parse_identities(&online)?;
            let sync = Arc::new(SyncCoordinator::new(live, backup));
            let _ = sync.load_backup().await;

            let policy = config.access_policy();
            let mut refreshed = sync.subscribe();
            let sweeper = tokio::spawn(async move {
                while refreshed.changed().await.is_ok() {
                    let snapshot = refreshed.borrow_and_update().clone();
                    for (identity, message) in policy.sweep(&online, &snapshot, chrono::Utc::now()) {
                        tracing::warn!(identity = %identity, message = %message, "connected identity is now banned");
                    }
                }
            });

            let schedule = sync.start(config.refresh_period());
            tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
            tracing::info!("shutting down");
            schedule.stop();
            sweeper.abort();
        }
        Command::Show { live: from_live } => {
            let store: Arc<dyn RecordStore> = if from_live { live } else { backup };
            let outcome = store.load().await.with_context(|| format!("loading {} records", store.name()))?;
            for diagnostic in &outcome.diagnostics {
                diagnostic.log(store.name());
            }
            display::print_record_set(&outcome.records);
        }
    }

    Ok(())
}

fn parse_identities(raw: &[String]) -> anyhow::Result<Vec<Uuid>> {
    raw.iter()
        .map(|value| parse_identity(value).with_context(|| format!("invalid identity {value:?}")))
        .collect()
}
