use std::time::Instant;

use chrono::{SecondsFormat, Utc};
use meter_core::{ChannelMapping, UsageEntry};
use meter_db::Db;
use serde_json::Value;

use crate::parser::{normalize_payload, parse_auth_files};
use crate::resolver::{ChannelResolver, CredentialIndex, UpstreamSource};
use crate::types::{IngestReport, Result};

/// Runs one ingestion cycle: normalize, resolve channels, price, persist.
///
/// A malformed payload aborts before anything is written. Upstream lookups
/// run concurrently and degrade to fallbacks on failure.
pub fn ingest_payload(
    db: &mut Db,
    payload: &Value,
    upstream: &dyn UpstreamSource,
) -> Result<IngestReport> {
    let start = Instant::now();
    let normalized = normalize_payload(payload)?;
    for issue in &normalized.issues {
        tracing::warn!(location = %issue.location, "skipped usage event: {}", issue.message);
    }
    let attempted = normalized.drafts.len();

    let (auth_files, credentials) = rayon::join(
        || fetch_auth_files(upstream),
        || CredentialIndex::fetch(upstream),
    );
    // Unique per cycle so the writer can fall back to counting stamped rows.
    let synced_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
    if !auth_files.is_empty() {
        let stats = db.upsert_channel_mappings(&auth_files, &synced_at)?;
        tracing::debug!(
            inserted = stats.inserted,
            updated = stats.updated,
            unchanged = stats.unchanged,
            "channel mappings synced"
        );
    }
    let resolver = ChannelResolver::new(&db.list_channel_mappings()?, credentials);
    let matcher = db.price_matcher()?;

    let entries: Vec<UsageEntry> = normalized
        .drafts
        .into_iter()
        .map(|draft| draft.into_entry(&resolver, &matcher))
        .collect();
    let inserted = db.insert_usage_entries(&entries, &synced_at)?;

    tracing::info!(
        attempted,
        inserted,
        skipped = normalized.issues.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "ingestion cycle complete"
    );
    Ok(IngestReport {
        attempted,
        inserted,
        issues: normalized.issues,
    })
}

fn fetch_auth_files(upstream: &dyn UpstreamSource) -> Vec<ChannelMapping> {
    match upstream.fetch_auth_files() {
        Ok(value) => parse_auth_files(&value),
        Err(err) => {
            tracing::warn!(error = %err, "auth file fetch failed");
            Vec::new()
        }
    }
}
