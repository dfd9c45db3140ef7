mod channels;
mod cursor;
mod pricing;
mod sample;
mod window;
mod zone;

use serde::{Deserialize, Serialize};

pub use channels::{
    ChannelMapping, CredentialKind, CredentialListing, KeyedCredential, OpenAiCompatEntry,
    UNKNOWN_CHANNEL,
};
pub use cursor::{CursorError, CursorValue, SeekCursor, SortField, SortOrder};
pub use pricing::{
    CostBreakdown, PriceMatcher, PriceRule, PriceRuleInput, Rates, compute_cost_breakdown,
    compute_cost_usd, glob_matches, pattern_specificity,
};
pub use sample::{
    DEFAULT_MAX_POINTS, MAX_MAX_POINTS, MIN_MAX_POINTS, clamp_max_points, sample_step,
    sampled_count,
};
pub use window::{
    DEFAULT_WINDOW_DAYS, MAX_WINDOW_DAYS, MIN_WINDOW_DAYS, TimeRange, UsageFilter,
    clamp_window_days, format_ts, parse_ts,
};
pub use zone::{BucketZone, ZoneBucket, ZoneError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageTokens {
    pub input_tokens: u64,
    pub cached_tokens: u64,
    pub output_tokens: u64,
    pub reasoning_tokens: u64,
    pub total_tokens: u64,
}

impl UsageTokens {
    pub fn saturating_add(self, other: UsageTokens) -> UsageTokens {
        UsageTokens {
            input_tokens: self.input_tokens.saturating_add(other.input_tokens),
            cached_tokens: self.cached_tokens.saturating_add(other.cached_tokens),
            output_tokens: self.output_tokens.saturating_add(other.output_tokens),
            reasoning_tokens: self.reasoning_tokens.saturating_add(other.reasoning_tokens),
            total_tokens: self.total_tokens.saturating_add(other.total_tokens),
        }
    }
}

/// One model invocation as persisted. Never mutated after ingestion apart
/// from cost recomputation when price rules change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageEntry {
    pub ts: String,
    pub route: String,
    pub source: String,
    pub auth_index: Option<String>,
    pub channel: Option<String>,
    pub model: String,
    pub tokens: UsageTokens,
    pub is_error: bool,
    pub cost_usd: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_json: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub id: i64,
    #[serde(flatten)]
    pub entry: UsageEntry,
    pub synced_at: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RollupStats {
    pub requests: u64,
    pub success_count: u64,
    pub failure_count: u64,
    #[serde(flatten)]
    pub tokens: UsageTokens,
    #[serde(flatten)]
    pub cost: CostBreakdown,
}

impl RollupStats {
    pub fn absorb(
        &mut self,
        requests: u64,
        failures: u64,
        tokens: UsageTokens,
        cost: CostBreakdown,
    ) {
        self.requests = self.requests.saturating_add(requests);
        self.failure_count = self.failure_count.saturating_add(failures);
        self.success_count = self.requests.saturating_sub(self.failure_count);
        self.tokens = self.tokens.saturating_add(tokens);
        self.cost.add(&cost);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRollup {
    pub model: String,
    #[serde(flatten)]
    pub stats: RollupStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPage {
    pub items: Vec<ModelRollup>,
    pub page: u32,
    pub page_size: u32,
    pub total_models: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRollup {
    pub channel: String,
    #[serde(flatten)]
    pub stats: RollupStats,
}

/// A day or hour bucket. `bucket_start` is the UTC instant the bucket begins
/// at, so consumers can gap-fill without re-deriving timezone math.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeBucketRollup {
    pub label: String,
    pub bucket_start: String,
    #[serde(flatten)]
    pub stats: RollupStats,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterValues {
    pub models: Vec<String>,
    pub routes: Vec<String>,
    pub channels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorePoint {
    pub id: i64,
    pub ts: String,
    pub model: String,
    pub route: String,
    pub channel: Option<String>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub cost_usd: f64,
    pub is_error: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExploreResult {
    pub total: u64,
    pub returned: u64,
    pub step: u64,
    pub max_points: u32,
    pub points: Vec<ExplorePoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordsPage {
    pub rows: Vec<UsageRecord>,
    pub next_cursor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<FilterValues>,
}
