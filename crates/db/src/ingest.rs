use meter_core::{UsageEntry, UsageFilter};
use rusqlite::{Connection, params, params_from_iter};

use crate::Db;
use crate::error::Result;
use crate::helpers::filter_sql;

impl Db {
    /// Inserts entries, silently skipping any whose
    /// `(ts, route, model, source)` already exists. Returns the number of
    /// rows actually written by this call.
    pub fn insert_usage_entries(
        &mut self,
        entries: &[UsageEntry],
        synced_at: &str,
    ) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        let stamped_before = stamped_count(&tx, synced_at)?;
        let mut inserted = 0usize;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO usage_entry (
                  ts, route, source, auth_index, channel, model, input_tokens,
                  cached_tokens, output_tokens, reasoning_tokens, total_tokens,
                  is_error, cost_usd, raw_json, synced_at
                ) VALUES (
                  ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15
                )
                ON CONFLICT(ts, route, model, source) DO NOTHING
                "#,
            )?;
            for entry in entries {
                let rows = stmt.execute(params![
                    entry.ts,
                    entry.route,
                    entry.source,
                    entry.auth_index,
                    entry.channel,
                    entry.model,
                    entry.tokens.input_tokens as i64,
                    entry.tokens.cached_tokens as i64,
                    entry.tokens.output_tokens as i64,
                    entry.tokens.reasoning_tokens as i64,
                    entry.tokens.total_tokens as i64,
                    entry.is_error,
                    entry.cost_usd,
                    entry.raw_json,
                    synced_at,
                ])?;
                inserted += rows;
            }
        }
        // Conflict-skipping inserts can under-report; the growth in rows
        // stamped with `synced_at` within this transaction is authoritative.
        let stamped = stamped_count(&tx, synced_at)?.saturating_sub(stamped_before);
        tx.commit()?;
        if stamped > inserted {
            tracing::warn!(
                reported = inserted,
                stamped,
                synced_at,
                "insert count under-reported, using synced_at count"
            );
            return Ok(stamped);
        }
        Ok(inserted)
    }

    pub fn count_synced_at(&self, synced_at: &str) -> Result<usize> {
        stamped_count(&self.conn, synced_at)
    }

    pub fn count_usage_entries(&self, filter: Option<&UsageFilter>) -> Result<u64> {
        let count: i64 = match filter {
            Some(filter) => {
                let filter = filter_sql(filter);
                self.conn.query_row(
                    &format!("SELECT COUNT(*) FROM usage_entry WHERE {}", filter.clause),
                    params_from_iter(filter.params.iter()),
                    |row| row.get(0),
                )?
            }
            None => self
                .conn
                .query_row("SELECT COUNT(*) FROM usage_entry", [], |row| row.get(0))?,
        };
        Ok(count as u64)
    }
}

fn stamped_count(conn: &Connection, synced_at: &str) -> Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM usage_entry WHERE synced_at = ?1",
        params![synced_at],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}
