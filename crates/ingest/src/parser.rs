use std::fs;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use meter_core::{ChannelMapping, PriceMatcher, UsageEntry, UsageTokens, format_ts};
use serde_json::{Map, Value};

use crate::resolver::ChannelResolver;
use crate::types::{IngestError, IngestIssue, Result};

/// Keys that may hold a flat event list when the nested `apis` layout is absent.
const FLAT_LIST_KEYS: &[&str] = &["details", "events", "records", "data", "items"];

/// One usage event as read from the payload, before channel resolution and
/// pricing.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftEntry {
    pub ts: String,
    pub route: String,
    pub source: String,
    pub auth_index: Option<String>,
    pub model: String,
    pub tokens: UsageTokens,
    pub is_error: bool,
    pub raw_json: Option<String>,
}

impl DraftEntry {
    pub(crate) fn into_entry(
        self,
        resolver: &ChannelResolver,
        matcher: &PriceMatcher,
    ) -> UsageEntry {
        let channel = resolver.resolve(self.auth_index.as_deref(), &self.source);
        let cost_usd = matcher.cost_for(&self.model, self.tokens).total_cost_usd;
        UsageEntry {
            ts: self.ts,
            route: self.route,
            source: self.source,
            auth_index: self.auth_index,
            channel: Some(channel),
            model: self.model,
            tokens: self.tokens,
            is_error: self.is_error,
            cost_usd,
            raw_json: self.raw_json,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedPayload {
    pub drafts: Vec<DraftEntry>,
    pub issues: Vec<IngestIssue>,
}

pub fn load_payload(path: &Path) -> Result<Value> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Flattens an upstream usage payload into drafts.
///
/// Two layouts are understood, optionally wrapped in a `usage` envelope:
/// the nested `apis.<route>.models.<model>.details[]` tree, and a flat
/// event array (top level or under one of [`FLAT_LIST_KEYS`]) whose items
/// carry their own `route` and `model`. An empty list is valid; a payload
/// with no discoverable list is [`IngestError::MalformedPayload`].
pub fn normalize_payload(payload: &Value) -> Result<NormalizedPayload> {
    let root = payload.get("usage").unwrap_or(payload);
    let mut normalized = NormalizedPayload::default();

    if let Some(apis) = root.get("apis") {
        match apis {
            Value::Object(apis) => collect_nested(apis, &mut normalized),
            Value::Null => {}
            _ => {
                return Err(IngestError::MalformedPayload(
                    "`apis` is not an object".to_string(),
                ));
            }
        }
        return Ok(normalized);
    }

    let (label, items) = if let Value::Array(items) = root {
        ("events", items)
    } else {
        FLAT_LIST_KEYS
            .iter()
            .find_map(|key| match root.get(*key) {
                Some(Value::Array(items)) => Some((*key, items)),
                _ => None,
            })
            .ok_or_else(|| {
                IngestError::MalformedPayload("no usage event list found".to_string())
            })?
    };
    for (index, item) in items.iter().enumerate() {
        let location = format!("{}[{}]", label, index);
        let route = find_string(item, &[&["route"], &["api_key"], &["api"], &["endpoint"]]);
        let model = find_string(item, &[&["model"], &["model_name"]]);
        match (route, model) {
            (Some(route), Some(model)) => {
                push_draft(&mut normalized, item, route, model, location);
            }
            _ => normalized
                .issues
                .push(IngestIssue::new(location, "event is missing route or model")),
        }
    }
    Ok(normalized)
}

fn collect_nested(apis: &Map<String, Value>, normalized: &mut NormalizedPayload) {
    for (route, api) in apis {
        let Some(models) = api.get("models").and_then(Value::as_object) else {
            normalized.issues.push(IngestIssue::new(
                format!("apis.{}", route),
                "route has no models object",
            ));
            continue;
        };
        for (model, stats) in models {
            let Some(details) = stats.get("details").and_then(Value::as_array) else {
                continue;
            };
            for (index, detail) in details.iter().enumerate() {
                let location = format!("apis.{}.models.{}.details[{}]", route, model, index);
                let model = find_string(detail, &[&["model"]]).unwrap_or(model.as_str());
                push_draft(normalized, detail, route, model, location);
            }
        }
    }
}

fn push_draft(
    normalized: &mut NormalizedPayload,
    event: &Value,
    route: &str,
    model: &str,
    location: String,
) {
    if !event.is_object() {
        normalized
            .issues
            .push(IngestIssue::new(location, "event is not an object"));
        return;
    }
    let Some(ts) = extract_timestamp(event) else {
        normalized
            .issues
            .push(IngestIssue::new(location, "missing or invalid timestamp"));
        return;
    };
    let route = route.trim();
    let model = model.trim();
    if route.is_empty() || model.is_empty() {
        normalized
            .issues
            .push(IngestIssue::new(location, "event has an empty route or model"));
        return;
    }
    normalized.drafts.push(DraftEntry {
        ts,
        route: route.to_string(),
        source: find_string(event, &[&["source"]])
            .map(|value| value.trim().to_string())
            .unwrap_or_default(),
        auth_index: extract_auth_index(event),
        model: model.to_string(),
        tokens: extract_tokens(event),
        is_error: extract_is_error(event),
        raw_json: serde_json::to_string(event).ok(),
    });
}

fn extract_tokens(event: &Value) -> UsageTokens {
    let tokens = event.get("tokens").or_else(|| event.get("usage")).unwrap_or(event);
    let input_tokens = find_u64(tokens, &["input_tokens", "prompt_tokens", "input"]);
    let output_tokens = find_u64(tokens, &["output_tokens", "completion_tokens", "output"]);
    let reasoning_tokens = find_u64(tokens, &["reasoning_tokens", "reasoning_output_tokens"]);
    let cached_tokens = find_u64(
        tokens,
        &["cached_tokens", "cache_tokens", "cached_input_tokens"],
    );
    let total_tokens = match find_u64(tokens, &["total_tokens", "total"]) {
        0 => input_tokens
            .saturating_add(output_tokens)
            .saturating_add(reasoning_tokens),
        total => total,
    };
    UsageTokens {
        input_tokens,
        cached_tokens,
        output_tokens,
        reasoning_tokens,
        total_tokens,
    }
}

fn extract_is_error(event: &Value) -> bool {
    if let Some(failed) = event.get("failed").and_then(Value::as_bool) {
        return failed;
    }
    if let Some(is_error) = event.get("is_error").and_then(Value::as_bool) {
        return is_error;
    }
    event.get("success").and_then(Value::as_bool) == Some(false)
}

fn extract_auth_index(event: &Value) -> Option<String> {
    ["auth_index", "authIndex", "auth_id"]
        .iter()
        .filter_map(|key| event.get(*key))
        .find_map(value_to_string)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn extract_timestamp(event: &Value) -> Option<String> {
    ["timestamp", "ts", "time", "requested_at"]
        .iter()
        .filter_map(|key| event.get(*key))
        .find_map(|value| match value {
            Value::String(raw) => normalize_timestamp(raw),
            Value::Number(number) => number
                .as_i64()
                .and_then(|raw| epoch_to_ts(raw, raw.abs() > 99_999_999_999)),
            _ => None,
        })
}

/// Parses RFC 3339, naive UTC, or epoch seconds/milliseconds into the
/// canonical millisecond `...Z` form used for storage and uniqueness.
pub(crate) fn normalize_timestamp(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(format_ts(parsed.with_timezone(&Utc)));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(format_ts(parsed.and_utc()));
        }
    }
    if !raw.is_empty()
        && raw.chars().all(|ch| ch.is_ascii_digit())
        && let Ok(value) = raw.parse::<i64>()
    {
        return epoch_to_ts(value, raw.len() > 10);
    }
    None
}

fn epoch_to_ts(value: i64, millis: bool) -> Option<String> {
    let parsed = if millis {
        DateTime::<Utc>::from_timestamp_millis(value)
    } else {
        DateTime::<Utc>::from_timestamp(value, 0)
    };
    parsed.map(format_ts)
}

/// Reads an auth-file listing (`{"files": [...]}` or a bare array) into
/// channel mappings. Entries without an id are dropped.
pub fn parse_auth_files(value: &Value) -> Vec<ChannelMapping> {
    let files = value
        .get("files")
        .or_else(|| value.get("auth_files"))
        .unwrap_or(value);
    let Some(files) = files.as_array() else {
        return Vec::new();
    };
    files
        .iter()
        .filter_map(|file| {
            let auth_id = ["auth_index", "id", "index"]
                .iter()
                .filter_map(|key| file.get(*key))
                .find_map(value_to_string)?
                .trim()
                .to_string();
            if auth_id.is_empty() {
                return None;
            }
            let text = |paths: &[&[&str]]| {
                find_string(file, paths)
                    .map(|value| value.trim().to_string())
                    .unwrap_or_default()
            };
            Some(ChannelMapping {
                auth_id,
                name: text(&[&["name"], &["file_name"]]),
                label: text(&[&["label"]]),
                provider: text(&[&["provider"], &["type"]]),
                source: text(&[&["source"], &["path"]]),
                email: text(&[&["email"], &["account", "email"]]),
                updated_at: find_string(file, &[&["updated_at"], &["modtime"]])
                    .and_then(normalize_timestamp),
                synced_at: None,
            })
        })
        .collect()
}

fn find_string<'a>(value: &'a Value, paths: &[&[&str]]) -> Option<&'a str> {
    for path in paths {
        let mut current = value;
        let mut ok = true;
        for key in *path {
            if let Some(next) = current.get(*key) {
                current = next;
            } else {
                ok = false;
                break;
            }
        }
        if ok
            && let Some(found) = current.as_str()
            && !found.trim().is_empty()
        {
            return Some(found);
        }
    }
    None
}

fn find_u64(value: &Value, keys: &[&str]) -> u64 {
    keys.iter()
        .filter_map(|key| value.get(*key))
        .find_map(|value| match value {
            Value::Number(number) => number
                .as_u64()
                .or_else(|| number.as_f64().filter(|raw| *raw >= 0.0).map(|raw| raw as u64)),
            Value::String(raw) => raw.trim().parse::<u64>().ok(),
            _ => None,
        })
        .unwrap_or(0)
}

fn value_to_string(value: &Value) -> Option<String> {
    if let Some(text) = value.as_str() {
        return Some(text.to_string());
    }
    if let Some(number) = value.as_i64() {
        return Some(number.to_string());
    }
    None
}
