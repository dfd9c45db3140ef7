mod support;

use meter_core::{BucketZone, UsageEntry, UsageTokens};
use support::{filter, insert_entries, insert_rules, make_entry, rule, setup_db, tokens};

const START: &str = "2025-03-01T00:00:00.000Z";
const END: &str = "2025-03-03T00:00:00.000Z";

fn at(ts: &str, model: &str, tokens: UsageTokens) -> UsageEntry {
    make_entry(ts, "r", model, "src", tokens)
}

#[test]
fn totals_and_model_pages_carry_costs() {
    let mut test_db = setup_db();
    let db = &mut test_db.db;
    insert_rules(db, vec![rule("gpt-4o", 2.0, 0.5, 10.0)]);
    let mut failed = make_entry(
        "2025-03-01T11:00:00.000Z",
        "route-b",
        "claude-x",
        "src",
        tokens(100, 0, 50, 0),
    );
    failed.is_error = true;
    insert_entries(
        db,
        vec![
            make_entry(
                "2025-03-01T10:00:00.000Z",
                "route-a",
                "gpt-4o",
                "src",
                tokens(1_000_000, 200_000, 500_000, 100_000),
            ),
            failed,
        ],
    );
    let window = filter(START, END);

    let totals = db.usage_totals(&window).expect("totals");
    assert_eq!(totals.requests, 2);
    assert_eq!(totals.failure_count, 1);
    assert_eq!(totals.success_count, 1);
    assert_eq!(totals.tokens.input_tokens, 1_000_100);
    assert_eq!(totals.tokens.cached_tokens, 200_000);
    assert!((totals.cost.total_cost_usd - 7.7).abs() < 1e-9);
    assert!((totals.cost.input_cost_usd - 1.6).abs() < 1e-9);
    assert!((totals.cost.cached_input_cost_usd - 0.1).abs() < 1e-9);
    assert!((totals.cost.output_cost_usd - 6.0).abs() < 1e-9);

    let first = db.model_rollups(&window, 1, Some(1)).expect("page 1");
    assert_eq!(first.total_models, 2);
    assert_eq!(first.items.len(), 1);
    assert_eq!(first.items[0].model, "gpt-4o");
    let second = db.model_rollups(&window, 2, Some(1)).expect("page 2");
    assert_eq!(second.items[0].model, "claude-x");
    assert_eq!(second.items[0].stats.cost.total_cost_usd, 0.0);
    assert_eq!(second.items[0].stats.failure_count, 1);
}

#[test]
fn grouped_cost_clamps_cached_per_row() {
    let mut test_db = setup_db();
    let db = &mut test_db.db;
    insert_rules(db, vec![rule("m", 1_000_000.0, 0.0, 0.0)]);
    insert_entries(
        db,
        vec![
            // Anomalous row: more cached than input.
            at("2025-03-01T10:00:00.000Z", "m", tokens(100, 300, 0, 0)),
            at("2025-03-01T10:01:00.000Z", "m", tokens(1_000, 0, 0, 0)),
        ],
    );

    let totals = db.usage_totals(&filter(START, END)).expect("totals");
    assert!((totals.cost.input_cost_usd - 1_000.0).abs() < 1e-6);
}

#[test]
fn buckets_follow_requested_timezone() {
    let mut test_db = setup_db();
    let db = &mut test_db.db;
    insert_entries(
        db,
        vec![
            at("2025-03-01T15:30:00.000Z", "m", tokens(1, 0, 1, 0)),
            at("2025-03-01T18:30:00.000Z", "m", tokens(1, 0, 1, 0)),
        ],
    );
    let window = filter(START, END);
    let utc8: BucketZone = "UTC+8".parse().expect("zone");

    let daily = db.daily_rollups(&window, &utc8, None).expect("daily");
    let labels: Vec<&str> = daily.iter().map(|bucket| bucket.label.as_str()).collect();
    assert_eq!(labels, vec!["2025-03-01", "2025-03-02"]);
    assert_eq!(daily[0].bucket_start, "2025-02-28T16:00:00.000Z");
    assert_eq!(daily[1].bucket_start, "2025-03-01T16:00:00.000Z");
    assert_eq!(daily[1].stats.requests, 1);

    let hourly = db.hourly_rollups(&window, &utc8).expect("hourly");
    assert_eq!(hourly[0].label, "2025-03-01 23:00");
    assert_eq!(hourly[0].bucket_start, "2025-03-01T15:00:00.000Z");
    assert_eq!(hourly[1].label, "2025-03-02 02:00");
    assert_eq!(hourly[1].bucket_start, "2025-03-01T18:00:00.000Z");

    let utc_daily = db
        .daily_rollups(&window, &BucketZone::utc(), None)
        .expect("utc daily");
    assert_eq!(utc_daily.len(), 1);
    assert_eq!(utc_daily[0].label, "2025-03-01");
    assert_eq!(utc_daily[0].stats.requests, 2);
}

#[test]
fn daily_rollups_keep_most_recent_days() {
    let mut test_db = setup_db();
    let db = &mut test_db.db;
    insert_entries(
        db,
        ["2025-03-01", "2025-03-02", "2025-03-03", "2025-03-04"]
            .iter()
            .map(|day| at(&format!("{day}T12:00:00.000Z"), "m", tokens(1, 0, 1, 0)))
            .collect(),
    );

    let window = filter(START, "2025-03-05T00:00:00.000Z");
    let daily = db
        .daily_rollups(&window, &BucketZone::utc(), Some(2))
        .expect("daily");
    let labels: Vec<&str> = daily.iter().map(|bucket| bucket.label.as_str()).collect();
    assert_eq!(labels, vec!["2025-03-03", "2025-03-04"]);
}

#[test]
fn bucket_cost_sums_per_model_rates() {
    let mut test_db = setup_db();
    let db = &mut test_db.db;
    insert_rules(
        db,
        vec![rule("gpt-4o", 2.0, 0.5, 10.0), rule("claude-*", 3.0, 0.3, 15.0)],
    );
    insert_entries(
        db,
        vec![
            at("2025-03-01T10:05:00.000Z", "gpt-4o", tokens(1_000_000, 0, 0, 0)),
            at("2025-03-01T10:10:00.000Z", "claude-sonnet", tokens(0, 0, 1_000_000, 0)),
        ],
    );

    let hourly = db
        .hourly_rollups(&filter(START, END), &BucketZone::utc())
        .expect("hourly");
    assert_eq!(hourly.len(), 1);
    assert!((hourly[0].stats.cost.total_cost_usd - 17.0).abs() < 1e-9);
}

#[test]
fn channel_rollups_and_filters_fall_back_to_source() {
    let mut test_db = setup_db();
    let db = &mut test_db.db;
    let one = tokens(1, 0, 1, 0);
    let mut resolved = make_entry("2025-03-01T10:00:00.000Z", "route-a", "m", "raw-1", one);
    resolved.channel = Some("team-a".to_string());
    let mut unresolved = make_entry("2025-03-01T10:01:00.000Z", "route-b", "m", "raw-2", one);
    unresolved.channel = None;
    insert_entries(db, vec![resolved, unresolved]);
    let window = filter(START, END);

    let channels = db.channel_rollups(&window).expect("channels");
    let mut names: Vec<&str> = channels.iter().map(|item| item.channel.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["raw-2", "team-a"]);

    let only_raw = db
        .usage_totals(&window.clone().with_channel("raw-2"))
        .expect("channel totals");
    assert_eq!(only_raw.requests, 1);
    let by_route = db
        .usage_totals(&window.clone().with_route("route-a"))
        .expect("route totals");
    assert_eq!(by_route.requests, 1);

    let values = db.filter_values(&window.range).expect("filters");
    assert_eq!(values.models, vec!["m".to_string()]);
    assert_eq!(values.routes, vec!["route-a".to_string(), "route-b".to_string()]);
    assert_eq!(values.channels, vec!["raw-2".to_string(), "team-a".to_string()]);
}

#[test]
fn distinct_models_ignore_the_window() {
    let mut test_db = setup_db();
    let db = &mut test_db.db;
    let one = tokens(1, 0, 1, 0);
    insert_entries(
        db,
        vec![
            make_entry("2024-01-01T00:00:00.000Z", "r", "old-model", "s", one),
            make_entry("2025-03-01T10:00:00.000Z", "r", "gpt-4o", "s", one),
            make_entry("2025-03-01T11:00:00.000Z", "r", "gpt-4o", "s", one),
        ],
    );

    let models = db.distinct_models().expect("models");
    assert_eq!(models, vec!["gpt-4o".to_string(), "old-model".to_string()]);
}
