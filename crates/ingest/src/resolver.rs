use std::collections::HashMap;
use std::fmt::Write;

use meter_core::{ChannelMapping, CredentialKind, CredentialListing, UNKNOWN_CHANNEL};
use rayon::prelude::*;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Upstream management endpoints consulted during ingestion. Implementations
/// own their transport and timeouts.
pub trait UpstreamSource: Send + Sync {
    fn fetch_auth_files(&self) -> std::result::Result<Value, FetchError>;
    fn fetch_credentials(&self, kind: CredentialKind) -> std::result::Result<Value, FetchError>;
}

/// A failed upstream fetch. Always recoverable: resolution drops to the next
/// fallback tier.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("upstream unavailable: {0}")]
    Unavailable(String),
    #[error("invalid upstream response: {0}")]
    Invalid(String),
}

/// Short SHA-256 prefix identifying an API key in logs without exposing it.
pub fn key_fingerprint(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    let mut out = String::with_capacity(12);
    for byte in &digest[..6] {
        let _ = write!(&mut out, "{:02x}", byte);
    }
    out
}

/// API key to channel name, merged from every credential listing.
#[derive(Debug, Clone, Default)]
pub struct CredentialIndex {
    keys: HashMap<String, String>,
}

impl CredentialIndex {
    /// Earlier listings win when two share a key.
    pub fn from_listings(listings: &[CredentialListing]) -> Self {
        let mut keys = HashMap::new();
        for listing in listings {
            for (key, channel) in listing.key_channels() {
                if keys.contains_key(&key) {
                    tracing::debug!(
                        key = %key_fingerprint(&key),
                        endpoint = listing.kind().endpoint(),
                        "api key listed twice, keeping first channel"
                    );
                    continue;
                }
                keys.insert(key, channel);
            }
        }
        Self { keys }
    }

    /// Fetches all four listings concurrently. A failed or unparseable
    /// endpoint is logged and skipped; the others still contribute.
    pub fn fetch(upstream: &dyn UpstreamSource) -> Self {
        let listings: Vec<Option<CredentialListing>> = CredentialKind::ALL
            .par_iter()
            .map(|kind| fetch_listing(upstream, *kind))
            .collect();
        let listings: Vec<CredentialListing> = listings.into_iter().flatten().collect();
        Self::from_listings(&listings)
    }

    pub fn channel_for_key(&self, key: &str) -> Option<&str> {
        self.keys.get(key.trim()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

fn fetch_listing(upstream: &dyn UpstreamSource, kind: CredentialKind) -> Option<CredentialListing> {
    let value = match upstream.fetch_credentials(kind) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(endpoint = kind.endpoint(), error = %err, "credential fetch failed");
            return None;
        }
    };
    match CredentialListing::parse(kind, &value) {
        Ok(listing) => Some(listing),
        Err(err) => {
            tracing::warn!(
                endpoint = kind.endpoint(),
                error = %err,
                "credential listing has an unexpected shape"
            );
            None
        }
    }
}

/// Maps an entry's auth index or source to a display channel.
#[derive(Debug, Clone, Default)]
pub struct ChannelResolver {
    mappings: HashMap<String, String>,
    credentials: CredentialIndex,
}

impl ChannelResolver {
    pub fn new(mappings: &[ChannelMapping], credentials: CredentialIndex) -> Self {
        let mappings = mappings
            .iter()
            .filter_map(|mapping| {
                mapping
                    .display_name()
                    .map(|name| (mapping.auth_id.clone(), name.to_string()))
            })
            .collect();
        Self {
            mappings,
            credentials,
        }
    }

    /// Mapping by auth index, then credential listings by API key, then the
    /// raw source, then [`UNKNOWN_CHANNEL`].
    pub fn resolve(&self, auth_index: Option<&str>, source: &str) -> String {
        let auth_index = auth_index.map(str::trim).filter(|value| !value.is_empty());
        if let Some(name) = auth_index.and_then(|auth| self.mappings.get(auth)) {
            return name.clone();
        }
        let source = source.trim();
        let by_key = [Some(source), auth_index]
            .into_iter()
            .flatten()
            .filter(|value| !value.is_empty())
            .find_map(|key| self.credentials.channel_for_key(key));
        if let Some(channel) = by_key {
            return channel.to_string();
        }
        if !source.is_empty() {
            return source.to_string();
        }
        UNKNOWN_CHANNEL.to_string()
    }
}
