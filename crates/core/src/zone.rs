use std::fmt;
use std::str::FromStr;

use chrono::{
    DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone,
    Timelike, Utc,
};
use chrono_tz::Tz;

#[derive(Debug, thiserror::Error)]
pub enum ZoneError {
    #[error("unknown timezone: {0}")]
    Unknown(String),
    #[error("utc offset out of range: {0}")]
    OffsetOutOfRange(String),
}

/// Timezone used to cut day and hour buckets. Accepts `UTC`, `UTC+8`,
/// `GMT-05:30`, `+0800`, or an IANA name in any case such as `Asia/Shanghai`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BucketZone {
    Fixed(FixedOffset),
    Named(Tz),
}

/// Bucket a timestamp falls into: a display label plus the UTC instant the
/// bucket starts at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneBucket {
    pub label: String,
    pub start: DateTime<Utc>,
}

impl Default for BucketZone {
    fn default() -> Self {
        Self::utc()
    }
}

impl BucketZone {
    pub fn utc() -> Self {
        Self::Fixed(Utc.fix())
    }

    pub fn local_naive(&self, ts: DateTime<Utc>) -> NaiveDateTime {
        match self {
            Self::Fixed(offset) => ts.with_timezone(offset).naive_local(),
            Self::Named(tz) => ts.with_timezone(tz).naive_local(),
        }
    }

    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        self.local_naive(now).date()
    }

    pub fn day_bucket(&self, ts: DateTime<Utc>) -> ZoneBucket {
        let local = self.local_naive(ts);
        let midnight = local.date().and_time(NaiveTime::MIN);
        let start = match self {
            Self::Fixed(_) => shift_to_utc(ts, local, midnight),
            // DST transitions can move the offset between midnight and `ts`.
            Self::Named(tz) => tz
                .from_local_datetime(&midnight)
                .earliest()
                .map(|value| value.with_timezone(&Utc))
                .unwrap_or_else(|| shift_to_utc(ts, local, midnight)),
        };
        ZoneBucket {
            label: local.format("%Y-%m-%d").to_string(),
            start,
        }
    }

    pub fn hour_bucket(&self, ts: DateTime<Utc>) -> ZoneBucket {
        let local = self.local_naive(ts);
        let truncated = local
            .with_minute(0)
            .and_then(|value| value.with_second(0))
            .and_then(|value| value.with_nanosecond(0))
            .unwrap_or(local);
        ZoneBucket {
            label: local.format("%Y-%m-%d %H:00").to_string(),
            start: shift_to_utc(ts, local, truncated),
        }
    }
}

/// Moves `ts` back by however far `truncated` sits before `local`, keeping the
/// offset that was in effect at `ts`.
fn shift_to_utc(
    ts: DateTime<Utc>,
    local: NaiveDateTime,
    truncated: NaiveDateTime,
) -> DateTime<Utc> {
    let delta: Duration = local - truncated;
    ts - delta
}

impl FromStr for BucketZone {
    type Err = ZoneError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let upper = trimmed.to_ascii_uppercase();
        if matches!(upper.as_str(), "" | "Z" | "UTC" | "GMT") {
            return Ok(Self::utc());
        }
        let offset_part = upper
            .strip_prefix("UTC")
            .or_else(|| upper.strip_prefix("GMT"))
            .unwrap_or(upper.as_str());
        if offset_part.starts_with('+') || offset_part.starts_with('-') {
            return parse_offset(offset_part)
                .map(Self::Fixed)
                .ok_or_else(|| ZoneError::OffsetOutOfRange(trimmed.to_string()));
        }
        // IANA names match case-insensitively and keep their canonical spelling.
        trimmed
            .parse::<Tz>()
            .ok()
            .or_else(|| {
                chrono_tz::TZ_VARIANTS
                    .iter()
                    .copied()
                    .find(|tz| tz.name().eq_ignore_ascii_case(trimmed))
            })
            .map(Self::Named)
            .ok_or_else(|| ZoneError::Unknown(trimmed.to_string()))
    }
}

impl fmt::Display for BucketZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(offset) => {
                let seconds = offset.local_minus_utc();
                if seconds == 0 {
                    return write!(f, "UTC");
                }
                let sign = if seconds < 0 { '-' } else { '+' };
                let minutes = seconds.unsigned_abs() / 60;
                write!(f, "UTC{}{:02}:{:02}", sign, minutes / 60, minutes % 60)
            }
            Self::Named(tz) => write!(f, "{}", tz.name()),
        }
    }
}

fn parse_offset(value: &str) -> Option<FixedOffset> {
    let (sign, digits) = value.split_at(1);
    let sign = if sign == "-" { -1 } else { 1 };
    let (hours, minutes) = if let Some((hours, minutes)) = digits.split_once(':') {
        (hours.parse::<i32>().ok()?, minutes.parse::<i32>().ok()?)
    } else if digits.len() == 4 && digits.is_ascii() {
        (digits[..2].parse::<i32>().ok()?, digits[2..].parse::<i32>().ok()?)
    } else {
        (digits.parse::<i32>().ok()?, 0)
    };
    if !(0..=14).contains(&hours) || !(0..60).contains(&minutes) {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("parse ts")
            .with_timezone(&Utc)
    }

    #[test]
    fn parses_offsets_and_names() {
        assert_eq!("UTC".parse::<BucketZone>().expect("utc"), BucketZone::utc());
        assert_eq!(
            "UTC+8".parse::<BucketZone>().expect("utc+8").to_string(),
            "UTC+08:00"
        );
        assert_eq!(
            "gmt-05:30".parse::<BucketZone>().expect("gmt").to_string(),
            "UTC-05:30"
        );
        assert_eq!(
            "+0545".parse::<BucketZone>().expect("bare").to_string(),
            "UTC+05:45"
        );
        assert_eq!(
            "Asia/Shanghai".parse::<BucketZone>().expect("named").to_string(),
            "Asia/Shanghai"
        );
        assert!("UTC+15".parse::<BucketZone>().is_err());
        assert!("Mars/Olympus".parse::<BucketZone>().is_err());
    }

    #[test]
    fn zone_names_ignore_case() {
        let lower: BucketZone = "asia/shanghai".parse().expect("lowercase name");
        assert_eq!(lower.to_string(), "Asia/Shanghai");
        let upper: BucketZone = " AMERICA/NEW_YORK ".parse().expect("uppercase name");
        assert_eq!(upper.to_string(), "America/New_York");
        assert_eq!(lower.day_bucket(ts("2025-03-01T18:30:00Z")).label, "2025-03-02");
    }

    #[test]
    fn day_bucket_follows_local_calendar() {
        let zone: BucketZone = "UTC+8".parse().expect("zone");
        let bucket = zone.day_bucket(ts("2025-03-01T18:30:00Z"));

        assert_eq!(bucket.label, "2025-03-02");
        assert_eq!(bucket.start, ts("2025-03-01T16:00:00Z"));
        let utc_bucket = BucketZone::utc().day_bucket(ts("2025-03-01T18:30:00Z"));
        assert_eq!(utc_bucket.label, "2025-03-01");
    }

    #[test]
    fn hour_bucket_handles_half_hour_offsets() {
        let zone: BucketZone = "UTC+05:30".parse().expect("zone");
        let bucket = zone.hour_bucket(ts("2025-03-01T10:10:00Z"));

        assert_eq!(bucket.label, "2025-03-01 15:00");
        assert_eq!(bucket.start, ts("2025-03-01T09:30:00Z"));
    }

    #[test]
    fn named_zone_day_start_survives_dst_switch() {
        let zone: BucketZone = "America/New_York".parse().expect("zone");
        // 2025-03-09 switches from EST to EDT at 02:00 local.
        let bucket = zone.day_bucket(ts("2025-03-09T18:00:00Z"));

        assert_eq!(bucket.label, "2025-03-09");
        assert_eq!(bucket.start, ts("2025-03-09T05:00:00Z"));
    }
}
