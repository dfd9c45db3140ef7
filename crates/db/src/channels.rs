use std::collections::HashMap;

use meter_core::ChannelMapping;
use rusqlite::{OptionalExtension, params};

use crate::Db;
use crate::error::Result;
use crate::helpers::row_to_channel_mapping;
use crate::types::ChannelSyncStats;

const MAPPING_COLUMNS: &str =
    "auth_id, name, label, provider, source, email, updated_at, synced_at";

impl Db {
    pub fn list_channel_mappings(&self) -> Result<Vec<ChannelMapping>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM channel_mapping ORDER BY auth_id",
            MAPPING_COLUMNS
        ))?;
        let rows = stmt
            .query_map([], row_to_channel_mapping)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn channel_mapping(&self, auth_id: &str) -> Result<Option<ChannelMapping>> {
        let mapping = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM channel_mapping WHERE auth_id = ?1",
                    MAPPING_COLUMNS
                ),
                params![auth_id],
                row_to_channel_mapping,
            )
            .optional()?;
        Ok(mapping)
    }

    /// Applies an auth-file listing through [`ChannelMapping::merge`]. Every
    /// listed id gets `synced_at` stamped, changed or not.
    pub fn upsert_channel_mappings(
        &mut self,
        incoming: &[ChannelMapping],
        synced_at: &str,
    ) -> Result<ChannelSyncStats> {
        let mut existing: HashMap<String, ChannelMapping> = self
            .list_channel_mappings()?
            .into_iter()
            .map(|mapping| (mapping.auth_id.clone(), mapping))
            .collect();
        let mut stats = ChannelSyncStats::default();
        let tx = self.conn.transaction()?;
        {
            let mut upsert = tx.prepare(
                r#"
                INSERT INTO channel_mapping (
                  auth_id, name, label, provider, source, email, updated_at, synced_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(auth_id) DO UPDATE SET
                  name = excluded.name,
                  label = excluded.label,
                  provider = excluded.provider,
                  source = excluded.source,
                  email = excluded.email,
                  updated_at = excluded.updated_at,
                  synced_at = excluded.synced_at
                "#,
            )?;
            let mut touch =
                tx.prepare("UPDATE channel_mapping SET synced_at = ?1 WHERE auth_id = ?2")?;
            for mapping in incoming {
                let auth_id = mapping.auth_id.trim();
                if auth_id.is_empty() {
                    continue;
                }
                let (merged, is_new) = match existing.get_mut(auth_id) {
                    Some(current) => {
                        if !current.merge(mapping) {
                            touch.execute(params![synced_at, auth_id])?;
                            stats.unchanged += 1;
                            continue;
                        }
                        (current.clone(), false)
                    }
                    None => {
                        let mut fresh = mapping.clone();
                        fresh.auth_id = auth_id.to_string();
                        existing.insert(fresh.auth_id.clone(), fresh.clone());
                        (fresh, true)
                    }
                };
                upsert.execute(params![
                    merged.auth_id,
                    merged.name,
                    merged.label,
                    merged.provider,
                    merged.source,
                    merged.email,
                    merged.updated_at,
                    synced_at,
                ])?;
                if is_new {
                    stats.inserted += 1;
                } else {
                    stats.updated += 1;
                }
            }
        }
        tx.commit()?;
        Ok(stats)
    }
}
