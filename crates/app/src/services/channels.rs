use chrono::{SecondsFormat, Utc};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::services::{SharedConfig, open_db};
use ingest::{UpstreamSource, parse_auth_files};
use meter_core::ChannelMapping;
use meter_db::{ChannelSyncStats, Db};

#[derive(Clone)]
pub struct ChannelService {
    config: SharedConfig,
}

impl ChannelService {
    pub(super) fn new(config: SharedConfig) -> Self {
        Self { config }
    }

    fn db(&self) -> Result<Db> {
        open_db(&self.config)
    }

    pub fn list(&self) -> Result<Vec<ChannelMapping>> {
        let db = self.db()?;
        Ok(db.list_channel_mappings()?)
    }

    /// Pulls the auth-file listing and applies it. Unlike ingestion, a failed
    /// fetch is reported to the caller.
    pub fn sync(&self, upstream: &dyn UpstreamSource) -> Result<ChannelSyncStats> {
        let listing = upstream
            .fetch_auth_files()
            .map_err(|err| AppError::Message(format!("fetch auth files: {}", err)))?;
        self.sync_listing(&listing)
    }

    pub fn sync_listing(&self, listing: &Value) -> Result<ChannelSyncStats> {
        let mappings = parse_auth_files(listing);
        let synced_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        let mut db = self.db()?;
        let stats = db.upsert_channel_mappings(&mappings, &synced_at)?;
        tracing::info!(
            inserted = stats.inserted,
            updated = stats.updated,
            unchanged = stats.unchanged,
            "channel mappings synced"
        );
        Ok(stats)
    }
}
