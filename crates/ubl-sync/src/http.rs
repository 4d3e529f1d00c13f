//! HTTP fetcher for the published spreadsheet list feed.

use std::time::Duration;

use thiserror::Error;
use tracing::info;
use ubl_core::{FeedParser, ParseOutcome, RecordSet};
use ubl_store::{RecordStore, StoreError};

const FEED_URL_FORMAT: &str = "https://spreadsheets.google.com/feeds/list";

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
}

impl From<SyncError> for StoreError {
    fn from(err: SyncError) -> Self {
        StoreError::Transport(Box::new(err))
    }
}

/// Read-only record store backed by the live spreadsheet feed.
pub struct LiveFeedStore {
    client: reqwest::Client,
    feed_url: String,
    parser: FeedParser,
}

impl LiveFeedStore {
    /// Create a fetcher for the given document/worksheet pair.
    ///
    /// `timeout` bounds each whole request so a hung fetch cannot hold the
    /// refresh lock forever.
    pub fn new(
        document_id: &str,
        worksheet_id: &str,
        parser: FeedParser,
        timeout: Duration,
    ) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            feed_url: feed_url(document_id, worksheet_id),
            parser,
        })
    }

    pub fn feed_url(&self) -> &str {
        &self.feed_url
    }

    async fn fetch(&self) -> Result<String, SyncError> {
        info!(url = %self.feed_url, "fetching live feed");
        let resp = self.client.get(&self.feed_url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::Server {
                status: status.as_u16(),
                body,
            });
        }
        let body = resp.text().await?;
        info!(bytes = body.len(), "fetched live feed");
        Ok(body)
    }
}

#[async_trait::async_trait]
impl RecordStore for LiveFeedStore {
    fn name(&self) -> &'static str {
        "live"
    }

    async fn load(&self) -> Result<ParseOutcome, StoreError> {
        let body = self.fetch().await?;
        Ok(self.parser.parse(&body)?)
    }

    async fn save(&self, _records: &RecordSet) -> Result<(), StoreError> {
        Err(StoreError::ReadOnly("live feed"))
    }
}

fn feed_url(document_id: &str, worksheet_id: &str) -> String {
    format!(
        "{FEED_URL_FORMAT}/{}/{}/public/values?alt=json",
        document_id.trim(),
        worksheet_id.trim()
    )
}
