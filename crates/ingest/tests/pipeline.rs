use std::collections::HashMap;

use ingest::{FetchError, IngestError, UpstreamSource, ingest_payload};
use meter_core::{CredentialKind, PriceRuleInput, SortField, SortOrder, TimeRange, UsageFilter};
use meter_db::{Db, RecordsQuery};
use serde_json::{Value, json};
use tempfile::TempDir;

struct StaticUpstream {
    auth_files: Option<Value>,
    credentials: HashMap<CredentialKind, Value>,
}

impl UpstreamSource for StaticUpstream {
    fn fetch_auth_files(&self) -> Result<Value, FetchError> {
        self.auth_files
            .clone()
            .ok_or_else(|| FetchError::Unavailable("no auth files".to_string()))
    }

    fn fetch_credentials(&self, kind: CredentialKind) -> Result<Value, FetchError> {
        self.credentials
            .get(&kind)
            .cloned()
            .ok_or_else(|| FetchError::Unavailable(kind.endpoint().to_string()))
    }
}

fn setup_db() -> (TempDir, Db) {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut db = Db::open(dir.path().join("ingest.sqlite")).expect("open db");
    db.migrate().expect("migrate db");
    (dir, db)
}

fn upstream() -> StaticUpstream {
    let mut credentials = HashMap::new();
    credentials.insert(
        CredentialKind::OpenAiCompatible,
        json!({"openai-compatibility": [
            {"name": "openrouter", "api-key-entries": [{"api-key": "sk-or-1"}]}
        ]}),
    );
    StaticUpstream {
        auth_files: Some(json!({"files": [
            {"auth_index": "1", "name": "claude-work.json", "provider": "claude"}
        ]})),
        credentials,
    }
}

fn payload() -> Value {
    json!({"usage": {"apis": {"route-a": {"models": {
        "gpt-4o": {"details": [
            {
                "timestamp": "2025-03-01T10:00:00Z",
                "source": "sk-or-1",
                "auth_index": "42",
                "tokens": {
                    "input_tokens": 1000000,
                    "cached_tokens": 200000,
                    "output_tokens": 500000,
                    "reasoning_tokens": 100000
                }
            },
            {
                "timestamp": "2025-03-01T10:05:00Z",
                "source": "claude-work.json",
                "auth_index": "1",
                "tokens": {"input_tokens": 10, "output_tokens": 5}
            },
            {"source": "sk-or-1", "tokens": {"input_tokens": 1}}
        ]}
    }}}}})
}

fn records(db: &Db) -> Vec<meter_core::UsageRecord> {
    let filter = UsageFilter::new(TimeRange {
        start: "2025-03-01T00:00:00.000Z".to_string(),
        end: "2025-03-02T00:00:00.000Z".to_string(),
    });
    let mut query = RecordsQuery::new(filter);
    query.sort = SortField::Time;
    query.order = SortOrder::Asc;
    db.records_page(&query).expect("records").rows
}

#[test]
fn ingesting_twice_is_idempotent() {
    let (_dir, mut db) = setup_db();
    let upstream = upstream();

    let first = ingest_payload(&mut db, &payload(), &upstream).expect("first ingest");
    let second = ingest_payload(&mut db, &payload(), &upstream).expect("second ingest");

    assert_eq!(first.attempted, 2);
    assert_eq!(first.inserted, 2);
    assert_eq!(first.issues.len(), 1);
    assert_eq!(second.attempted, 2);
    assert_eq!(second.inserted, 0);
    assert_eq!(db.count_usage_entries(None).expect("count"), 2);
}

#[test]
fn unmapped_auth_index_falls_back_to_credential_listing() {
    let (_dir, mut db) = setup_db();
    ingest_payload(&mut db, &payload(), &upstream()).expect("ingest");

    let rows = records(&db);
    assert_eq!(rows[0].entry.auth_index.as_deref(), Some("42"));
    assert_eq!(rows[0].entry.channel.as_deref(), Some("openrouter"));
    assert_eq!(rows[1].entry.channel.as_deref(), Some("claude-work.json"));
}

#[test]
fn upstream_outage_degrades_to_raw_source() {
    let (_dir, mut db) = setup_db();
    let offline = StaticUpstream {
        auth_files: None,
        credentials: HashMap::new(),
    };

    let report = ingest_payload(&mut db, &payload(), &offline).expect("ingest");
    assert_eq!(report.inserted, 2);
    let rows = records(&db);
    assert_eq!(rows[0].entry.channel.as_deref(), Some("sk-or-1"));
}

#[test]
fn cost_is_attributed_at_ingest() {
    let (_dir, mut db) = setup_db();
    db.upsert_price_rule(
        &PriceRuleInput {
            model: "gpt-4*".to_string(),
            input_per_1m: 2.0,
            cached_input_per_1m: 0.5,
            output_per_1m: 10.0,
        },
        "2025-01-01T00:00:00.000Z",
    )
    .expect("rule");

    ingest_payload(&mut db, &payload(), &upstream()).expect("ingest");
    let rows = records(&db);
    assert!((rows[0].entry.cost_usd - 7.7).abs() < 1e-9);
}

#[test]
fn malformed_payload_writes_nothing() {
    let (_dir, mut db) = setup_db();

    let err = ingest_payload(&mut db, &json!({"status": "ok"}), &upstream())
        .expect_err("malformed");
    assert!(matches!(err, IngestError::MalformedPayload(_)));
    assert_eq!(db.count_usage_entries(None).expect("count"), 0);
    assert!(db.list_channel_mappings().expect("mappings").is_empty());
}

#[test]
fn empty_payload_is_a_clean_cycle() {
    let (_dir, mut db) = setup_db();
    let empty = json!({"usage": {"apis": {}}});
    let report = ingest_payload(&mut db, &empty, &upstream()).expect("ingest");
    assert_eq!(report.attempted, 0);
    assert_eq!(report.inserted, 0);
}
