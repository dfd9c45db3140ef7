use meter_core::{SortField, SortOrder, UsageFilter, UsageTokens};

pub(crate) const DEFAULT_RECORDS_PAGE_SIZE: u32 = 50;
pub(crate) const MAX_RECORDS_PAGE_SIZE: u32 = 500;

/// Outcome of applying an auth-file listing to the mapping table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelSyncStats {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
}

#[derive(Debug, Clone)]
pub struct RecordsQuery {
    pub filter: UsageFilter,
    pub sort: SortField,
    pub order: SortOrder,
    pub page_size: Option<u32>,
    pub cursor: Option<String>,
    pub include_filters: bool,
}

impl RecordsQuery {
    pub fn new(filter: UsageFilter) -> Self {
        Self {
            filter,
            sort: SortField::default(),
            order: SortOrder::default(),
            page_size: None,
            cursor: None,
            include_filters: false,
        }
    }

    pub(crate) fn limit(&self) -> u32 {
        self.page_size
            .unwrap_or(DEFAULT_RECORDS_PAGE_SIZE)
            .clamp(1, MAX_RECORDS_PAGE_SIZE)
    }
}

/// One `GROUP BY key, model` row. Cost is priced per model afterwards.
#[derive(Debug, Clone)]
pub(crate) struct GroupRow {
    pub key: String,
    pub model: String,
    pub requests: u64,
    pub failures: u64,
    pub tokens: UsageTokens,
    /// Sum of `max(input - cached, 0)` taken row by row.
    pub billable_input: u64,
}
