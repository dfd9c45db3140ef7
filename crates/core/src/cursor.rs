use std::str::FromStr;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};

use crate::UsageRecord;

#[derive(Debug, thiserror::Error)]
pub enum CursorError {
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("invalid cursor payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Columns the records view can be sorted by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    Time,
    Model,
    Route,
    InputTokens,
    OutputTokens,
    TotalTokens,
    Cost,
    IsError,
}

impl SortField {
    pub fn column(self) -> &'static str {
        match self {
            Self::Time => "ts",
            Self::Model => "model",
            Self::Route => "route",
            Self::InputTokens => "input_tokens",
            Self::OutputTokens => "output_tokens",
            Self::TotalTokens => "total_tokens",
            Self::Cost => "cost_usd",
            Self::IsError => "is_error",
        }
    }

    pub fn value_of(self, record: &UsageRecord) -> CursorValue {
        let entry = &record.entry;
        match self {
            Self::Time => CursorValue::Text(entry.ts.clone()),
            Self::Model => CursorValue::Text(entry.model.clone()),
            Self::Route => CursorValue::Text(entry.route.clone()),
            Self::InputTokens => CursorValue::Integer(entry.tokens.input_tokens as i64),
            Self::OutputTokens => CursorValue::Integer(entry.tokens.output_tokens as i64),
            Self::TotalTokens => CursorValue::Integer(entry.tokens.total_tokens as i64),
            Self::Cost => CursorValue::Real(entry.cost_usd),
            Self::IsError => CursorValue::Integer(i64::from(entry.is_error)),
        }
    }
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "time" | "ts" | "timestamp" => Ok(Self::Time),
            "model" => Ok(Self::Model),
            "route" => Ok(Self::Route),
            "input_tokens" => Ok(Self::InputTokens),
            "output_tokens" => Ok(Self::OutputTokens),
            "total_tokens" | "tokens" => Ok(Self::TotalTokens),
            "cost" | "cost_usd" => Ok(Self::Cost),
            "is_error" | "failed" => Ok(Self::IsError),
            other => Err(format!("unsupported sort field {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    /// Comparison that moves past the cursor in this order.
    pub fn seek_operator(self) -> &'static str {
        match self {
            Self::Asc => ">",
            Self::Desc => "<",
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(format!("unsupported sort order {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CursorValue {
    Integer(i64),
    Real(f64),
    Text(String),
}

/// Position after the last row of a page: the sort value plus the row id
/// that breaks ties between equal values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeekCursor {
    #[serde(rename = "f")]
    pub field: SortField,
    #[serde(rename = "v")]
    pub value: CursorValue,
    pub id: i64,
}

impl SeekCursor {
    pub fn after(field: SortField, record: &UsageRecord) -> Self {
        Self {
            field,
            value: field.value_of(record),
            id: record.id,
        }
    }

    pub fn encode(&self) -> String {
        // Serializing plain enums and numbers cannot fail.
        let raw = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(raw)
    }

    pub fn decode(encoded: &str) -> Result<Self, CursorError> {
        let bytes = URL_SAFE_NO_PAD.decode(encoded.trim())?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Cursors that fail to decode, or that were issued for another sort
    /// field, mean "start from the beginning".
    pub fn decode_for(encoded: Option<&str>, field: SortField) -> Option<Self> {
        let encoded = encoded.filter(|value| !value.trim().is_empty())?;
        Self::decode(encoded)
            .ok()
            .filter(|cursor| cursor.field == field)
    }
}
