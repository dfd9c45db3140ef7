use serde::{Deserialize, Serialize};

/// Window and filters accepted by every analytics call. Explicit `start` and
/// `end` win over `days`.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct RangeParams {
    pub days: Option<i64>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub model: Option<String>,
    pub route: Option<String>,
    pub channel: Option<String>,
    pub tz: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct RecordsParams {
    pub sort: Option<String>,
    pub order: Option<String>,
    pub page_size: Option<u32>,
    pub cursor: Option<String>,
    #[serde(default)]
    pub include_filters: bool,
}
