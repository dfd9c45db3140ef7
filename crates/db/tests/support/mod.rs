#![allow(dead_code)]

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use meter_core::{PriceRuleInput, TimeRange, UsageEntry, UsageFilter, UsageTokens, format_ts};
use meter_db::Db;
use tempfile::TempDir;

pub const SYNCED_AT: &str = "2025-03-01T00:00:00.000000Z";

pub struct TestDb {
    pub _dir: TempDir,
    pub db: Db,
    pub path: PathBuf,
}

pub fn setup_db() -> TestDb {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("test.sqlite");
    let mut db = Db::open(&path).expect("open db");
    db.migrate().expect("migrate db");
    TestDb {
        _dir: dir,
        db,
        path,
    }
}

pub fn tokens(input: u64, cached: u64, output: u64, reasoning: u64) -> UsageTokens {
    UsageTokens {
        input_tokens: input,
        cached_tokens: cached,
        output_tokens: output,
        reasoning_tokens: reasoning,
        total_tokens: input + output + reasoning,
    }
}

pub fn make_entry(
    ts: &str,
    route: &str,
    model: &str,
    source: &str,
    tokens: UsageTokens,
) -> UsageEntry {
    UsageEntry {
        ts: ts.to_string(),
        route: route.to_string(),
        source: source.to_string(),
        auth_index: None,
        channel: Some(source.to_string()),
        model: model.to_string(),
        tokens,
        is_error: false,
        cost_usd: 0.0,
        raw_json: None,
    }
}

pub fn insert_entries(db: &mut Db, entries: Vec<UsageEntry>) -> usize {
    db.insert_usage_entries(&entries, SYNCED_AT)
        .expect("insert entries")
}

pub fn rule(model: &str, input: f64, cached: f64, output: f64) -> PriceRuleInput {
    PriceRuleInput {
        model: model.to_string(),
        input_per_1m: input,
        cached_input_per_1m: cached,
        output_per_1m: output,
    }
}

pub fn insert_rules(db: &mut Db, rules: Vec<PriceRuleInput>) {
    db.replace_price_rules(&rules, "2025-01-01T00:00:00.000Z")
        .expect("replace rules");
}

pub fn ts(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .expect("parse ts")
        .with_timezone(&Utc)
}

/// `count` entries one second apart starting at `start`.
pub fn sequential_entries(start: &str, count: usize, model: &str) -> Vec<UsageEntry> {
    let start = ts(start);
    (0..count)
        .map(|index| {
            let at = start + Duration::seconds(index as i64);
            make_entry(
                &format_ts(at),
                "route-a",
                model,
                "src",
                tokens(100 + index as u64, 0, 10, 0),
            )
        })
        .collect()
}

pub fn filter(start: &str, end: &str) -> UsageFilter {
    UsageFilter::new(TimeRange {
        start: start.to_string(),
        end: end.to_string(),
    })
}
