use std::path::Path;

use serde_json::Value;

use crate::error::Result;
use crate::services::{SharedConfig, open_db};
use ingest::{IngestReport, UpstreamSource};
use meter_db::Db;

#[derive(Clone)]
pub struct IngestService {
    config: SharedConfig,
}

impl IngestService {
    pub(super) fn new(config: SharedConfig) -> Self {
        Self { config }
    }

    fn db(&self) -> Result<Db> {
        open_db(&self.config)
    }

    pub fn run(&self, payload: &Value, upstream: &dyn UpstreamSource) -> Result<IngestReport> {
        let mut db = self.db()?;
        Ok(ingest::ingest_payload(&mut db, payload, upstream)?)
    }

    pub fn run_file(&self, path: &Path, upstream: &dyn UpstreamSource) -> Result<IngestReport> {
        let payload = ingest::load_payload(path)?;
        self.run(&payload, upstream)
    }
}
