use serde::Serialize;

use crate::config::{RangeParams, RecordsParams};
use crate::error::{AppError, Result};
use crate::services::{SharedConfig, open_db};
use crate::util::time::{parse_zone, resolve_filter};
use meter_core::{
    ChannelRollup, ExploreResult, FilterValues, ModelPage, RecordsPage, RollupStats, SortField,
    SortOrder, TimeBucketRollup, TimeRange, clamp_window_days,
};
use meter_db::{Db, RecordsQuery};

/// Everything the dashboard view needs for one window.
#[derive(Debug, Clone, Serialize)]
pub struct Overview {
    pub range: TimeRange,
    pub timezone: String,
    pub totals: RollupStats,
    pub models: ModelPage,
    pub channels: Vec<ChannelRollup>,
    pub daily: Vec<TimeBucketRollup>,
    pub hourly: Vec<TimeBucketRollup>,
    pub filters: FilterValues,
}

#[derive(Clone)]
pub struct AnalyticsService {
    config: SharedConfig,
}

impl AnalyticsService {
    pub(super) fn new(config: SharedConfig) -> Self {
        Self { config }
    }

    fn db(&self) -> Result<Db> {
        open_db(&self.config)
    }

    pub fn overview(
        &self,
        params: &RangeParams,
        page: u32,
        page_size: Option<u32>,
    ) -> Result<Overview> {
        let filter = resolve_filter(params)?;
        let zone = parse_zone(params.tz.as_deref(), &self.config.default_timezone)?;
        // A relative window can touch one more local day than it spans.
        let days = params
            .start
            .is_none()
            .then(|| clamp_window_days(params.days));
        let db = self.db()?;
        Ok(Overview {
            timezone: zone.to_string(),
            totals: db.usage_totals(&filter)?,
            models: db.model_rollups(&filter, page, page_size)?,
            channels: db.channel_rollups(&filter)?,
            daily: db.daily_rollups(&filter, &zone, days)?,
            hourly: db.hourly_rollups(&filter, &zone)?,
            filters: db.filter_values(&filter.range)?,
            range: filter.range,
        })
    }

    pub fn explore(&self, params: &RangeParams, max_points: Option<u32>) -> Result<ExploreResult> {
        let filter = resolve_filter(params)?;
        let db = self.db()?;
        Ok(db.sample_entries(&filter, max_points)?)
    }

    pub fn records(&self, params: &RangeParams, records: &RecordsParams) -> Result<RecordsPage> {
        let filter = resolve_filter(params)?;
        let mut query = RecordsQuery::new(filter);
        if let Some(sort) = records.sort.as_deref() {
            query.sort = sort.parse::<SortField>().map_err(AppError::InvalidInput)?;
        }
        if let Some(order) = records.order.as_deref() {
            query.order = order.parse::<SortOrder>().map_err(AppError::InvalidInput)?;
        }
        query.page_size = records.page_size;
        query.cursor = records.cursor.clone();
        query.include_filters = records.include_filters;
        let db = self.db()?;
        Ok(db.records_page(&query)?)
    }

    pub fn filters(&self, params: &RangeParams) -> Result<FilterValues> {
        let filter = resolve_filter(params)?;
        let db = self.db()?;
        Ok(db.filter_values(&filter.range)?)
    }
}
