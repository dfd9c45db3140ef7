mod parser;
mod pipeline;
mod resolver;
mod types;

pub use parser::{DraftEntry, NormalizedPayload, load_payload, normalize_payload, parse_auth_files};
pub use pipeline::ingest_payload;
pub use resolver::{ChannelResolver, CredentialIndex, FetchError, UpstreamSource, key_fingerprint};
pub use types::{IngestError, IngestIssue, IngestReport, Result};
