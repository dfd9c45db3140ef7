use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDateTime, Utc};
use meter_core::{
    BucketZone, ChannelRollup, ModelPage, ModelRollup, RollupStats, TimeBucketRollup,
    UsageFilter, ZoneBucket, format_ts,
};
use rusqlite::params_from_iter;

use crate::Db;
use crate::error::Result;
use crate::helpers::{absorb_group, channel_expr, filter_sql, grouped_sql, row_to_group};
use crate::types::GroupRow;

pub const DEFAULT_MODEL_PAGE_SIZE: u32 = 20;
pub const MAX_MODEL_PAGE_SIZE: u32 = 200;

impl Db {
    pub fn usage_totals(&self, filter: &UsageFilter) -> Result<RollupStats> {
        let matcher = self.price_matcher()?;
        let mut stats = RollupStats::default();
        for row in self.grouped("''", filter)? {
            absorb_group(&mut stats, &row, &matcher);
        }
        Ok(stats)
    }

    /// Per-model rollups ordered by cost, then request count, then name.
    /// `page` is 1-based.
    pub fn model_rollups(
        &self,
        filter: &UsageFilter,
        page: u32,
        page_size: Option<u32>,
    ) -> Result<ModelPage> {
        let matcher = self.price_matcher()?;
        let mut by_model: HashMap<String, RollupStats> = HashMap::new();
        for row in self.grouped("model", filter)? {
            absorb_group(by_model.entry(row.model.clone()).or_default(), &row, &matcher);
        }
        let mut items: Vec<ModelRollup> = by_model
            .into_iter()
            .map(|(model, stats)| ModelRollup { model, stats })
            .collect();
        items.sort_by(|a, b| {
            b.stats
                .cost
                .total_cost_usd
                .total_cmp(&a.stats.cost.total_cost_usd)
                .then_with(|| b.stats.requests.cmp(&a.stats.requests))
                .then_with(|| a.model.cmp(&b.model))
        });
        let page = page.max(1);
        let page_size = page_size
            .unwrap_or(DEFAULT_MODEL_PAGE_SIZE)
            .clamp(1, MAX_MODEL_PAGE_SIZE);
        let total_models = items.len() as u64;
        let skip = (page as usize - 1).saturating_mul(page_size as usize);
        let items = items
            .into_iter()
            .skip(skip)
            .take(page_size as usize)
            .collect();
        Ok(ModelPage {
            items,
            page,
            page_size,
            total_models,
        })
    }

    pub fn channel_rollups(&self, filter: &UsageFilter) -> Result<Vec<ChannelRollup>> {
        let matcher = self.price_matcher()?;
        let mut by_channel: HashMap<String, RollupStats> = HashMap::new();
        for row in self.grouped(&channel_expr(), filter)? {
            absorb_group(by_channel.entry(row.key.clone()).or_default(), &row, &matcher);
        }
        let mut items: Vec<ChannelRollup> = by_channel
            .into_iter()
            .map(|(channel, stats)| ChannelRollup { channel, stats })
            .collect();
        items.sort_by(|a, b| {
            b.stats
                .cost
                .total_cost_usd
                .total_cmp(&a.stats.cost.total_cost_usd)
                .then_with(|| b.stats.requests.cmp(&a.stats.requests))
                .then_with(|| a.channel.cmp(&b.channel))
        });
        Ok(items)
    }

    /// Calendar-day buckets in `zone`, oldest first. With `days`, only the
    /// most recent `days` non-empty buckets are kept.
    pub fn daily_rollups(
        &self,
        filter: &UsageFilter,
        zone: &BucketZone,
        days: Option<u32>,
    ) -> Result<Vec<TimeBucketRollup>> {
        let mut buckets = self.time_buckets(filter, |ts| zone.day_bucket(ts))?;
        if let Some(days) = days {
            let excess = buckets.len().saturating_sub(days as usize);
            buckets.drain(..excess);
        }
        Ok(buckets)
    }

    pub fn hourly_rollups(
        &self,
        filter: &UsageFilter,
        zone: &BucketZone,
    ) -> Result<Vec<TimeBucketRollup>> {
        self.time_buckets(filter, |ts| zone.hour_bucket(ts))
    }

    /// Groups by UTC minute in SQL, then assigns each minute to its local
    /// bucket. Every supported offset is a whole number of minutes, so no
    /// minute straddles two buckets.
    fn time_buckets(
        &self,
        filter: &UsageFilter,
        bucket_of: impl Fn(DateTime<Utc>) -> ZoneBucket,
    ) -> Result<Vec<TimeBucketRollup>> {
        let matcher = self.price_matcher()?;
        let mut buckets: BTreeMap<DateTime<Utc>, (String, RollupStats)> = BTreeMap::new();
        for row in self.grouped("substr(ts, 1, 16)", filter)? {
            let minute = NaiveDateTime::parse_from_str(&row.key, "%Y-%m-%dT%H:%M")?.and_utc();
            let bucket = bucket_of(minute);
            let (_, stats) = buckets
                .entry(bucket.start)
                .or_insert_with(|| (bucket.label, RollupStats::default()));
            absorb_group(stats, &row, &matcher);
        }
        Ok(buckets
            .into_iter()
            .map(|(start, (label, stats))| TimeBucketRollup {
                label,
                bucket_start: format_ts(start),
                stats,
            })
            .collect())
    }

    fn grouped(&self, key_expr: &str, filter: &UsageFilter) -> Result<Vec<GroupRow>> {
        let filter = filter_sql(filter);
        let mut stmt = self.conn.prepare(&grouped_sql(key_expr, &filter.clause))?;
        let rows = stmt
            .query_map(params_from_iter(filter.params.iter()), row_to_group)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
