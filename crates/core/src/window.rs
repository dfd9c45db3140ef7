use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_WINDOW_DAYS: u32 = 7;
pub const MIN_WINDOW_DAYS: u32 = 1;
pub const MAX_WINDOW_DAYS: u32 = 90;

/// Inclusive `[start, end]` window of RFC 3339 UTC timestamps with millisecond
/// precision, so plain string comparison orders them correctly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: String,
    pub end: String,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: format_ts(start),
            end: format_ts(end),
        }
    }

    /// The trailing `days` window ending at `now`.
    pub fn last_days(now: DateTime<Utc>, days: u32) -> Self {
        Self::new(now - Duration::days(i64::from(days)), now)
    }

    /// Explicit bounds win over a relative window when both are present. An
    /// `end` without a `start` anchors the relative window at `end`.
    pub fn resolve(
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        days: Option<i64>,
        now: DateTime<Utc>,
    ) -> Self {
        match (start, end) {
            (Some(start), Some(end)) => Self::new(start, end),
            (Some(start), None) => Self::new(start, now),
            (None, Some(end)) => Self::last_days(end, clamp_window_days(days)),
            _ => Self::last_days(now, clamp_window_days(days)),
        }
    }
}

pub fn clamp_window_days(days: Option<i64>) -> u32 {
    match days {
        Some(days) => days.clamp(i64::from(MIN_WINDOW_DAYS), i64::from(MAX_WINDOW_DAYS)) as u32,
        None => DEFAULT_WINDOW_DAYS,
    }
}

pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_ts(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

/// Filters shared by every rollup, sample, and records query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageFilter {
    pub range: TimeRange,
    pub model: Option<String>,
    pub route: Option<String>,
    /// Matches either the resolved channel name or the raw source.
    pub channel: Option<String>,
}

impl UsageFilter {
    pub fn new(range: TimeRange) -> Self {
        Self {
            range,
            model: None,
            route: None,
            channel: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(value: &str) -> DateTime<Utc> {
        parse_ts(value).expect("parse ts")
    }

    #[test]
    fn days_are_clamped() {
        assert_eq!(clamp_window_days(None), 7);
        assert_eq!(clamp_window_days(Some(0)), 1);
        assert_eq!(clamp_window_days(Some(-3)), 1);
        assert_eq!(clamp_window_days(Some(30)), 30);
        assert_eq!(clamp_window_days(Some(365)), 90);
    }

    #[test]
    fn explicit_range_beats_relative_days() {
        let now = ts("2025-06-30T00:00:00Z");
        let range = TimeRange::resolve(
            Some(ts("2025-01-01T00:00:00Z")),
            Some(ts("2025-01-02T00:00:00Z")),
            Some(3),
            now,
        );
        assert_eq!(range.start, "2025-01-01T00:00:00.000Z");
        assert_eq!(range.end, "2025-01-02T00:00:00.000Z");

        let relative = TimeRange::resolve(None, None, Some(3), now);
        assert_eq!(relative.start, "2025-06-27T00:00:00.000Z");
        assert_eq!(relative.end, "2025-06-30T00:00:00.000Z");
    }

    #[test]
    fn lone_end_anchors_relative_window() {
        let now = ts("2025-06-30T00:00:00Z");
        let range = TimeRange::resolve(None, Some(ts("2025-02-10T12:00:00Z")), Some(2), now);
        assert_eq!(range.start, "2025-02-08T12:00:00.000Z");
        assert_eq!(range.end, "2025-02-10T12:00:00.000Z");

        let open_ended = TimeRange::resolve(Some(ts("2025-06-29T00:00:00Z")), None, None, now);
        assert_eq!(open_ended.end, "2025-06-30T00:00:00.000Z");
    }
}
