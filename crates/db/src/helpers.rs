use meter_core::{
    ChannelMapping, PriceMatcher, PriceRule, RollupStats, UNKNOWN_CHANNEL, UsageEntry,
    UsageFilter, UsageRecord, UsageTokens,
};
use rusqlite::Row;
use rusqlite::types::Value;

use crate::types::GroupRow;

pub(crate) const RECORD_COLUMNS: &str = r#"
    id, ts, route, source, auth_index, channel, model, input_tokens, cached_tokens,
    output_tokens, reasoning_tokens, total_tokens, is_error, cost_usd, raw_json, synced_at
"#;

const GROUP_AGGREGATES: &str = r#"
    COUNT(*),
    COALESCE(SUM(is_error), 0),
    COALESCE(SUM(input_tokens), 0),
    COALESCE(SUM(cached_tokens), 0),
    COALESCE(SUM(output_tokens), 0),
    COALESCE(SUM(reasoning_tokens), 0),
    COALESCE(SUM(total_tokens), 0),
    COALESCE(SUM(MAX(input_tokens - cached_tokens, 0)), 0)
"#;

/// Display channel of a row: the resolved channel, else the raw source.
pub(crate) fn channel_expr() -> String {
    format!(
        "COALESCE(NULLIF(channel, ''), NULLIF(source, ''), '{}')",
        UNKNOWN_CHANNEL
    )
}

/// `WHERE` body plus positional parameters for a [`UsageFilter`].
pub(crate) struct FilterSql {
    pub clause: String,
    pub params: Vec<Value>,
}

pub(crate) fn filter_sql(filter: &UsageFilter) -> FilterSql {
    let mut clause = String::from("ts >= ? AND ts <= ?");
    let mut params = vec![
        Value::Text(filter.range.start.clone()),
        Value::Text(filter.range.end.clone()),
    ];
    if let Some(model) = non_empty(filter.model.as_deref()) {
        clause.push_str(" AND model = ?");
        params.push(Value::Text(model.to_string()));
    }
    if let Some(route) = non_empty(filter.route.as_deref()) {
        clause.push_str(" AND route = ?");
        params.push(Value::Text(route.to_string()));
    }
    if let Some(channel) = non_empty(filter.channel.as_deref()) {
        clause.push_str(&format!(" AND ({} = ? OR source = ?)", channel_expr()));
        params.push(Value::Text(channel.to_string()));
        params.push(Value::Text(channel.to_string()));
    }
    FilterSql { clause, params }
}

/// `SELECT <key>, model, <aggregates> ... GROUP BY 1, 2` for the given key.
pub(crate) fn grouped_sql(key_expr: &str, clause: &str) -> String {
    format!(
        "SELECT {key_expr} AS group_key, model, {GROUP_AGGREGATES} \
         FROM usage_entry WHERE {clause} GROUP BY group_key, model"
    )
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

pub(crate) fn row_to_usage_record(
    row: &Row<'_>,
) -> std::result::Result<UsageRecord, rusqlite::Error> {
    Ok(UsageRecord {
        id: row.get(0)?,
        entry: UsageEntry {
            ts: row.get(1)?,
            route: row.get(2)?,
            source: row.get(3)?,
            auth_index: row.get(4)?,
            channel: row.get(5)?,
            model: row.get(6)?,
            tokens: UsageTokens {
                input_tokens: row.get::<_, i64>(7)? as u64,
                cached_tokens: row.get::<_, i64>(8)? as u64,
                output_tokens: row.get::<_, i64>(9)? as u64,
                reasoning_tokens: row.get::<_, i64>(10)? as u64,
                total_tokens: row.get::<_, i64>(11)? as u64,
            },
            is_error: row.get::<_, i64>(12)? != 0,
            cost_usd: row.get(13)?,
            raw_json: row.get(14)?,
        },
        synced_at: row.get(15)?,
    })
}

pub(crate) fn row_to_group(row: &Row<'_>) -> std::result::Result<GroupRow, rusqlite::Error> {
    Ok(GroupRow {
        key: row.get(0)?,
        model: row.get(1)?,
        requests: row.get::<_, i64>(2)? as u64,
        failures: row.get::<_, i64>(3)? as u64,
        tokens: UsageTokens {
            input_tokens: row.get::<_, i64>(4)? as u64,
            cached_tokens: row.get::<_, i64>(5)? as u64,
            output_tokens: row.get::<_, i64>(6)? as u64,
            reasoning_tokens: row.get::<_, i64>(7)? as u64,
            total_tokens: row.get::<_, i64>(8)? as u64,
        },
        billable_input: row.get::<_, i64>(9)? as u64,
    })
}

pub(crate) fn row_to_price_rule(row: &Row<'_>) -> std::result::Result<PriceRule, rusqlite::Error> {
    Ok(PriceRule {
        model: row.get(0)?,
        input_per_1m: row.get(1)?,
        cached_input_per_1m: row.get(2)?,
        output_per_1m: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

pub(crate) fn row_to_channel_mapping(
    row: &Row<'_>,
) -> std::result::Result<ChannelMapping, rusqlite::Error> {
    Ok(ChannelMapping {
        auth_id: row.get(0)?,
        name: row.get(1)?,
        label: row.get(2)?,
        provider: row.get(3)?,
        source: row.get(4)?,
        email: row.get(5)?,
        updated_at: row.get(6)?,
        synced_at: row.get(7)?,
    })
}

/// Adds one grouped row to `stats`, priced at its model's rates.
pub(crate) fn absorb_group(stats: &mut RollupStats, row: &GroupRow, matcher: &PriceMatcher) {
    // Rebuild input so the formula's `input - cached` equals the clamped
    // per-row sum instead of clamping the group total once.
    let billing = UsageTokens {
        input_tokens: row.billable_input.saturating_add(row.tokens.cached_tokens),
        ..row.tokens
    };
    let cost = matcher.cost_for(&row.model, billing);
    stats.absorb(row.requests, row.failures, row.tokens, cost);
}
