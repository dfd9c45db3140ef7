use std::io;

use serde::Serialize;

/// Summary returned after one ingestion cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub attempted: usize,
    pub inserted: usize,
    pub issues: Vec<IngestIssue>,
}

/// Non-fatal problem with a single event; the event is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestIssue {
    pub location: String,
    pub message: String,
}

impl IngestIssue {
    pub(crate) fn new(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("db error: {0}")]
    Db(#[from] meter_db::DbError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, IngestError>;
