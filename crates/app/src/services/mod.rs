mod analytics;
mod channels;
mod ingest;
mod pricing;

use std::sync::Arc;

use crate::app::AppConfig;
use crate::error::Result;
use meter_db::Db;

pub use analytics::{AnalyticsService, Overview};
pub use channels::ChannelService;
pub use ingest::IngestService;
pub use pricing::{CatalogSyncReport, PricingService};

type SharedConfig = Arc<AppConfig>;

/// Service registry for app-level operations.
#[derive(Clone)]
pub struct AppServices {
    pub analytics: AnalyticsService,
    pub ingest: IngestService,
    pub pricing: PricingService,
    pub channels: ChannelService,
}

impl AppServices {
    pub fn new(config: &AppConfig) -> Self {
        let shared = Arc::new(config.clone());
        Self {
            analytics: AnalyticsService::new(shared.clone()),
            ingest: IngestService::new(shared.clone()),
            pricing: PricingService::new(shared.clone()),
            channels: ChannelService::new(shared),
        }
    }
}

fn open_db(config: &SharedConfig) -> Result<Db> {
    Ok(Db::open(&config.db_path)?)
}
