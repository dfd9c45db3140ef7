use rusqlite::Connection;

use crate::Db;
use crate::error::Result;

const MIGRATION_0001: &str = include_str!("../migrations/0001_init.sql");
const MIGRATION_0002: &str = include_str!("../migrations/0002_add_channel_mapping.sql");
const MIGRATION_0003: &str = include_str!("../migrations/0003_add_synced_at.sql");

const MIGRATIONS: &[(&str, &str)] = &[
    ("0001_init", MIGRATION_0001),
    ("0002_add_channel_mapping", MIGRATION_0002),
    ("0003_add_synced_at", MIGRATION_0003),
];

impl Db {
    /// Idempotent; safe to run on every open.
    pub fn migrate(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        for (name, sql) in MIGRATIONS {
            if *name == "0003_add_synced_at" {
                if !table_has_column(&tx, "usage_entry", "synced_at")? {
                    tx.execute_batch(sql)?;
                }
                ensure_usage_entry_indexes(&tx)?;
                continue;
            }
            tx.execute_batch(sql)?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

fn ensure_usage_entry_indexes(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE INDEX IF NOT EXISTS idx_usage_entry_synced_at ON usage_entry(synced_at);
        CREATE INDEX IF NOT EXISTS idx_usage_entry_channel_ts ON usage_entry(channel, ts);
        CREATE INDEX IF NOT EXISTS idx_usage_entry_route_ts ON usage_entry(route, ts);
        "#,
    )?;
    Ok(())
}
