use meter_core::{FilterValues, TimeRange};
use rusqlite::params;

use crate::Db;
use crate::error::Result;
use crate::helpers::channel_expr;

impl Db {
    /// Distinct models, routes, and channels seen inside `range`.
    pub fn filter_values(&self, range: &TimeRange) -> Result<FilterValues> {
        Ok(FilterValues {
            models: self.distinct_values("model", range)?,
            routes: self.distinct_values("route", range)?,
            channels: self.distinct_values(&channel_expr(), range)?,
        })
    }

    /// Every model ever recorded, regardless of window.
    pub fn distinct_models(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT model FROM usage_entry WHERE model <> '' ORDER BY model ASC",
        )?;
        let models = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(models)
    }

    fn distinct_values(&self, expr: &str, range: &TimeRange) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT DISTINCT {expr} AS value
            FROM usage_entry
            WHERE ts >= ?1 AND ts <= ?2 AND {expr} <> ''
            ORDER BY value ASC
            "#
        ))?;
        let values = stmt
            .query_map(params![range.start, range.end], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(values)
    }
}
