pub mod app;
pub mod config;
pub mod error;
pub mod pricing;
pub mod services;
pub mod startup;
pub mod util;

pub use app::{AppConfig, AppState};
pub use config::{RangeParams, RecordsParams};
pub use error::{ApiError, AppError, Result};
pub use pricing::{
    apply_pricing_defaults, load_initial_pricing, load_pricing_defaults, match_catalog_entry,
    strip_version_suffix, sync_pricing_defaults, write_pricing_defaults,
};
pub use services::{AppServices, CatalogSyncReport, Overview};
pub use startup::{AppPaths, ensure_app_data_dir};
pub use util::time::{normalize_rfc3339_to_utc, parse_zone, resolve_filter, resolve_filter_at};
