use std::time::Instant;

use meter_core::{PriceMatcher, PriceRule, PriceRuleInput, UsageTokens};
use rusqlite::{Transaction, params};

use crate::Db;
use crate::error::Result;
use crate::helpers::row_to_price_rule;

impl Db {
    pub fn list_price_rules(&self) -> Result<Vec<PriceRule>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT model, input_per_1m, cached_input_per_1m, output_per_1m, updated_at
            FROM price_rule
            ORDER BY model ASC
            "#,
        )?;
        let rows = stmt
            .query_map([], row_to_price_rule)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Snapshot of the current rules, read once per query or ingestion cycle.
    pub fn price_matcher(&self) -> Result<PriceMatcher> {
        Ok(PriceMatcher::new(&self.list_price_rules()?))
    }

    pub fn upsert_price_rule(&mut self, rule: &PriceRuleInput, updated_at: &str) -> Result<()> {
        self.upsert_price_rules(std::slice::from_ref(rule), updated_at)?;
        Ok(())
    }

    /// Bulk upsert keyed by model; rules not listed are left alone.
    pub fn upsert_price_rules(
        &mut self,
        rules: &[PriceRuleInput],
        updated_at: &str,
    ) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let written = write_price_rules(&tx, rules, updated_at)?;
        tx.commit()?;
        Ok(written)
    }

    pub fn replace_price_rules(
        &mut self,
        rules: &[PriceRuleInput],
        updated_at: &str,
    ) -> Result<usize> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM price_rule", [])?;
        let written = write_price_rules(&tx, rules, updated_at)?;
        tx.commit()?;
        Ok(written)
    }

    pub fn delete_price_rule(&mut self, model: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM price_rule WHERE model = ?1", params![model])?;
        Ok(rows > 0)
    }

    /// Re-prices every stored entry against the current rules.
    pub fn update_entry_costs(&mut self) -> Result<usize> {
        let start = Instant::now();
        let matcher = self.price_matcher()?;
        let rows = {
            let mut stmt = self.conn.prepare(
                r#"
                SELECT id, model, input_tokens, cached_tokens, output_tokens,
                       reasoning_tokens, total_tokens, cost_usd
                FROM usage_entry
                "#,
            )?;
            stmt.query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    UsageTokens {
                        input_tokens: row.get::<_, i64>(2)? as u64,
                        cached_tokens: row.get::<_, i64>(3)? as u64,
                        output_tokens: row.get::<_, i64>(4)? as u64,
                        reasoning_tokens: row.get::<_, i64>(5)? as u64,
                        total_tokens: row.get::<_, i64>(6)? as u64,
                    },
                    row.get::<_, f64>(7)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?
        };
        let scanned = rows.len();
        let tx = self.conn.transaction()?;
        let mut updated = 0usize;
        {
            let mut stmt = tx.prepare("UPDATE usage_entry SET cost_usd = ?1 WHERE id = ?2")?;
            for (id, model, tokens, current) in rows {
                let cost = matcher.cost_for(&model, tokens).total_cost_usd;
                if (cost - current).abs() < 1e-12 {
                    continue;
                }
                stmt.execute(params![cost, id])?;
                updated += 1;
            }
        }
        tx.commit()?;
        tracing::debug!(
            scanned,
            updated,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "recomputed entry costs"
        );
        Ok(updated)
    }
}

fn write_price_rules(
    tx: &Transaction<'_>,
    rules: &[PriceRuleInput],
    updated_at: &str,
) -> Result<usize> {
    let mut stmt = tx.prepare(
        r#"
        INSERT INTO price_rule (model, input_per_1m, cached_input_per_1m, output_per_1m, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        ON CONFLICT(model) DO UPDATE SET
          input_per_1m = excluded.input_per_1m,
          cached_input_per_1m = excluded.cached_input_per_1m,
          output_per_1m = excluded.output_per_1m,
          updated_at = excluded.updated_at
        "#,
    )?;
    let mut written = 0usize;
    for rule in rules {
        let model = rule.model.trim();
        if model.is_empty() {
            continue;
        }
        stmt.execute(params![
            model,
            rule.input_per_1m,
            rule.cached_input_per_1m,
            rule.output_per_1m,
            updated_at
        ])?;
        written += 1;
    }
    Ok(written)
}
