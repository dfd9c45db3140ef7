use chrono::{DateTime, Utc};

use crate::config::RangeParams;
use crate::error::{AppError, Result};
use meter_core::{BucketZone, TimeRange, UsageFilter, format_ts};

pub fn resolve_filter(params: &RangeParams) -> Result<UsageFilter> {
    resolve_filter_at(params, Utc::now())
}

/// Builds the query filter for `params` as of `now`.
pub fn resolve_filter_at(params: &RangeParams, now: DateTime<Utc>) -> Result<UsageFilter> {
    let start = params.start.as_deref().map(parse_instant).transpose()?;
    let end = params.end.as_deref().map(parse_instant).transpose()?;
    let range = TimeRange::resolve(start, end, params.days, now);
    if range.start > range.end {
        return Err(AppError::InvalidInput(format!(
            "range start {} is after end {}",
            range.start, range.end
        )));
    }
    let mut filter = UsageFilter::new(range);
    if let Some(model) = non_empty(&params.model) {
        filter = filter.with_model(model);
    }
    if let Some(route) = non_empty(&params.route) {
        filter = filter.with_route(route);
    }
    if let Some(channel) = non_empty(&params.channel) {
        filter = filter.with_channel(channel);
    }
    Ok(filter)
}

pub fn normalize_rfc3339_to_utc(value: &str) -> Result<String> {
    parse_instant(value).map(format_ts)
}

/// Request zone, or `default` when the request leaves it blank.
pub fn parse_zone(value: Option<&str>, default: &str) -> Result<BucketZone> {
    let name = value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(default);
    name.parse::<BucketZone>()
        .map_err(|err| AppError::InvalidInput(err.to_string()))
}

fn parse_instant(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|err| AppError::InvalidInput(format!("invalid datetime {}: {}", value, err)))
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
