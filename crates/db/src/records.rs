use meter_core::{CursorValue, RecordsPage, SeekCursor};
use rusqlite::params_from_iter;
use rusqlite::types::Value;

use crate::Db;
use crate::error::Result;
use crate::helpers::{RECORD_COLUMNS, filter_sql, row_to_usage_record};
use crate::types::RecordsQuery;

impl Db {
    /// Seek pagination over raw entries. The cursor carries the last row's
    /// sort value and id, so rows inserted between calls are neither skipped
    /// nor repeated.
    pub fn records_page(&self, query: &RecordsQuery) -> Result<RecordsPage> {
        let filter = filter_sql(&query.filter);
        let column = query.sort.column();
        let direction = query.order.keyword();
        let mut clause = filter.clause;
        let mut params = filter.params;

        let cursor = SeekCursor::decode_for(query.cursor.as_deref(), query.sort);
        if cursor.is_none() && query.cursor.as_deref().is_some_and(|raw| !raw.trim().is_empty()) {
            tracing::debug!(sort = column, "ignoring undecodable records cursor");
        }
        if let Some(cursor) = cursor {
            let op = query.order.seek_operator();
            clause.push_str(&format!(
                " AND ({column} {op} ? OR ({column} = ? AND id {op} ?))"
            ));
            let value = cursor_param(cursor.value);
            params.push(value.clone());
            params.push(value);
            params.push(Value::Integer(cursor.id));
        }

        let limit = query.limit() as usize;
        params.push(Value::Integer(limit as i64 + 1));
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM usage_entry WHERE {clause} \
             ORDER BY {column} {direction}, id {direction} LIMIT ?"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt
            .query_map(params_from_iter(params.iter()), row_to_usage_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let next_cursor = if rows.len() > limit {
            rows.truncate(limit);
            rows.last()
                .map(|row| SeekCursor::after(query.sort, row).encode())
        } else {
            None
        };
        let filters = if query.include_filters {
            Some(self.filter_values(&query.filter.range)?)
        } else {
            None
        };
        Ok(RecordsPage {
            rows,
            next_cursor,
            filters,
        })
    }
}

fn cursor_param(value: CursorValue) -> Value {
    match value {
        CursorValue::Integer(value) => Value::Integer(value),
        CursorValue::Real(value) => Value::Real(value),
        CursorValue::Text(value) => Value::Text(value),
    }
}
