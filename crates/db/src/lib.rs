use std::path::Path;

use rusqlite::Connection;

mod analytics;
mod channels;
mod error;
mod explore;
mod filters;
mod helpers;
mod ingest;
mod migrations;
mod pricing;
mod records;
mod types;

pub use analytics::{DEFAULT_MODEL_PAGE_SIZE, MAX_MODEL_PAGE_SIZE};
pub use error::{DbError, Result};
pub use types::{ChannelSyncStats, RecordsQuery};

pub struct Db {
    conn: Connection,
}

impl Db {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "temp_store", "MEMORY")?;
        conn.pragma_update(None, "cache_size", -20_000)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self { conn })
    }
}
