use meter_core::{ExplorePoint, ExploreResult, UsageFilter, clamp_max_points, sample_step};
use rusqlite::params_from_iter;
use rusqlite::types::Value;

use crate::Db;
use crate::error::Result;
use crate::helpers::filter_sql;

impl Db {
    /// Deterministic subsample: rows are ranked by `(ts, id)` and every
    /// `step`-th rank is kept, so unchanged data always yields the same points.
    pub fn sample_entries(
        &self,
        filter: &UsageFilter,
        max_points: Option<u32>,
    ) -> Result<ExploreResult> {
        let max_points = clamp_max_points(max_points);
        // Count and sample must read one snapshot or `step` can disagree
        // with the rows it is applied to.
        let tx = self.conn.unchecked_transaction()?;
        let total = self.count_usage_entries(Some(filter))?;
        let step = sample_step(total, max_points);
        let filter = filter_sql(filter);
        let sql = format!(
            r#"
            SELECT id, ts, model, route, channel, input_tokens, output_tokens,
                   total_tokens, cost_usd, is_error
            FROM (
              SELECT *, ROW_NUMBER() OVER (ORDER BY ts ASC, id ASC) AS rn
              FROM usage_entry
              WHERE {}
            )
            WHERE rn % ? = 0
            ORDER BY rn ASC
            "#,
            filter.clause
        );
        let mut params = filter.params;
        params.push(Value::Integer(step as i64));
        let mut stmt = tx.prepare(&sql)?;
        let points = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                Ok(ExplorePoint {
                    id: row.get(0)?,
                    ts: row.get(1)?,
                    model: row.get(2)?,
                    route: row.get(3)?,
                    channel: row.get(4)?,
                    input_tokens: row.get::<_, i64>(5)? as u64,
                    output_tokens: row.get::<_, i64>(6)? as u64,
                    total_tokens: row.get::<_, i64>(7)? as u64,
                    cost_usd: row.get(8)?,
                    is_error: row.get::<_, i64>(9)? != 0,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        drop(stmt);
        tx.commit()?;
        Ok(ExploreResult {
            total,
            returned: points.len() as u64,
            step,
            max_points,
            points,
        })
    }
}
