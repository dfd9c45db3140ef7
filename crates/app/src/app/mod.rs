use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};
use crate::pricing;
use crate::services::AppServices;
use meter_db::Db;

/// Files and defaults the metering services run against.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub pricing_defaults_path: PathBuf,
    /// Zone used for day and hour buckets when a request names none.
    pub default_timezone: String,
}

/// Application state shared by frontends (CLI, HTTP wrappers).
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub services: AppServices,
}

impl AppState {
    pub fn new(db_path: PathBuf, pricing_defaults_path: PathBuf) -> Self {
        Self::from_config(AppConfig {
            db_path,
            pricing_defaults_path,
            default_timezone: "UTC".to_string(),
        })
    }

    pub fn from_config(config: AppConfig) -> Self {
        let services = AppServices::new(&config);
        Self { config, services }
    }

    pub fn is_fresh_db(&self) -> bool {
        !self.config.db_path.exists()
    }

    pub fn setup_db(&self) -> Result<()> {
        setup_db(&self.config.db_path)
    }

    /// Migrates the store. A fresh database is seeded from the pricing
    /// defaults, then the defaults file is rewritten from the stored rules.
    pub fn initialize(&self) -> Result<()> {
        let is_fresh_db = self.is_fresh_db();
        self.setup_db()
            .map_err(|err| AppError::Message(format!("initialize db: {}", err)))?;
        if is_fresh_db {
            self.apply_pricing_defaults()?;
            tracing::info!(db = %self.config.db_path.display(), "seeded price rules");
        }
        self.sync_pricing_defaults()?;
        Ok(())
    }

    pub fn open_db(&self) -> Result<Db> {
        Ok(Db::open(&self.config.db_path)?)
    }

    pub fn apply_pricing_defaults(&self) -> Result<()> {
        pricing::apply_pricing_defaults(&self.config.db_path, &self.config.pricing_defaults_path)
    }

    pub fn sync_pricing_defaults(&self) -> Result<()> {
        pricing::sync_pricing_defaults(&self.config.db_path, &self.config.pricing_defaults_path)
    }
}

pub fn setup_db(path: &Path) -> Result<()> {
    let mut db = Db::open(path)?;
    db.migrate()?;
    Ok(())
}
