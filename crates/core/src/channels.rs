use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Channel name used when neither a mapping, a credential listing, nor a raw
/// source string identifies where an entry came from.
pub const UNKNOWN_CHANNEL: &str = "unknown channel";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMapping {
    pub auth_id: String,
    pub name: String,
    pub label: String,
    pub provider: String,
    pub source: String,
    pub email: String,
    pub updated_at: Option<String>,
    pub synced_at: Option<String>,
}

impl ChannelMapping {
    /// Label, then name, then email; empty values are skipped.
    pub fn display_name(&self) -> Option<&str> {
        [&self.label, &self.name, &self.email]
            .into_iter()
            .map(|value| value.trim())
            .find(|value| !value.is_empty())
    }

    /// Applies an incoming listing row. Empty incoming values never overwrite
    /// known ones, and when both sides carry `updated_at` the incoming row
    /// must be strictly newer. Returns whether any field changed.
    pub fn merge(&mut self, incoming: &ChannelMapping) -> bool {
        if let (Some(current), Some(next)) = (&self.updated_at, &incoming.updated_at)
            && next <= current
        {
            return false;
        }
        let mut changed = false;
        for (field, value) in [
            (&mut self.name, &incoming.name),
            (&mut self.label, &incoming.label),
            (&mut self.provider, &incoming.provider),
            (&mut self.source, &incoming.source),
            (&mut self.email, &incoming.email),
        ] {
            if !value.trim().is_empty() && field != value {
                *field = value.clone();
                changed = true;
            }
        }
        if let Some(updated_at) = &incoming.updated_at
            && self.updated_at.as_ref() != Some(updated_at)
        {
            self.updated_at = Some(updated_at.clone());
            changed = true;
        }
        changed
    }
}

/// Upstream credential endpoints that can attribute an API key to a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CredentialKind {
    OpenAiCompatible,
    Claude,
    Codex,
    Gemini,
}

impl CredentialKind {
    /// Fixed merge order; earlier kinds win when two listings share a key.
    pub const ALL: [CredentialKind; 4] = [
        CredentialKind::OpenAiCompatible,
        CredentialKind::Claude,
        CredentialKind::Codex,
        CredentialKind::Gemini,
    ];

    pub fn endpoint(self) -> &'static str {
        match self {
            Self::OpenAiCompatible => "openai-compatibility",
            Self::Claude => "claude-api-key",
            Self::Codex => "codex-api-key",
            Self::Gemini => "gemini-api-key",
        }
    }

    fn fallback_name(self) -> &'static str {
        match self {
            Self::OpenAiCompatible => "openai-compatible",
            Self::Claude => "claude",
            Self::Codex => "codex",
            Self::Gemini => "gemini",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct KeyedCredential {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OpenAiCompatEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key_entries: Vec<KeyedCredential>,
    /// Older listings carry bare keys instead of `api-key-entries`.
    #[serde(default)]
    pub api_keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
enum GeminiKey {
    Plain(String),
    Entry(KeyedCredential),
}

/// One parsed credential listing; each variant matches one endpoint's shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialListing {
    OpenAiCompatible(Vec<OpenAiCompatEntry>),
    Claude(Vec<KeyedCredential>),
    Codex(Vec<KeyedCredential>),
    Gemini(Vec<KeyedCredential>),
}

impl CredentialListing {
    /// Accepts either `{"<endpoint>": [...]}` or the bare array.
    pub fn parse(kind: CredentialKind, value: &Value) -> serde_json::Result<Self> {
        let list = value.get(kind.endpoint()).unwrap_or(value).clone();
        let list = if list.is_null() {
            Value::Array(Vec::new())
        } else {
            list
        };
        Ok(match kind {
            CredentialKind::OpenAiCompatible => {
                Self::OpenAiCompatible(serde_json::from_value(list)?)
            }
            CredentialKind::Claude => Self::Claude(serde_json::from_value(list)?),
            CredentialKind::Codex => Self::Codex(serde_json::from_value(list)?),
            CredentialKind::Gemini => {
                let keys: Vec<GeminiKey> = serde_json::from_value(list)?;
                Self::Gemini(
                    keys.into_iter()
                        .map(|key| match key {
                            GeminiKey::Plain(api_key) => KeyedCredential {
                                api_key,
                                ..KeyedCredential::default()
                            },
                            GeminiKey::Entry(entry) => entry,
                        })
                        .collect(),
                )
            }
        })
    }

    pub fn kind(&self) -> CredentialKind {
        match self {
            Self::OpenAiCompatible(_) => CredentialKind::OpenAiCompatible,
            Self::Claude(_) => CredentialKind::Claude,
            Self::Codex(_) => CredentialKind::Codex,
            Self::Gemini(_) => CredentialKind::Gemini,
        }
    }

    /// `(api key, channel name)` pairs in listing order. Entries without a
    /// key are dropped.
    pub fn key_channels(&self) -> Vec<(String, String)> {
        let fallback = self.kind().fallback_name();
        let mut pairs = Vec::new();
        match self {
            Self::OpenAiCompatible(providers) => {
                for provider in providers {
                    let channel = first_non_empty(&[
                        Some(provider.name.as_str()),
                        provider.base_url.as_deref(),
                    ])
                    .unwrap_or(fallback);
                    let keys = provider
                        .api_key_entries
                        .iter()
                        .map(|entry| entry.api_key.as_str())
                        .chain(provider.api_keys.iter().map(String::as_str));
                    for key in keys {
                        push_pair(&mut pairs, key, channel);
                    }
                }
            }
            Self::Claude(entries) | Self::Codex(entries) | Self::Gemini(entries) => {
                for entry in entries {
                    let channel =
                        first_non_empty(&[entry.name.as_deref(), entry.base_url.as_deref()])
                            .unwrap_or(fallback);
                    push_pair(&mut pairs, &entry.api_key, channel);
                }
            }
        }
        pairs
    }
}

fn first_non_empty<'a>(values: &[Option<&'a str>]) -> Option<&'a str> {
    values
        .iter()
        .flatten()
        .copied()
        .map(str::trim)
        .find(|value| !value.is_empty())
}

fn push_pair(pairs: &mut Vec<(String, String)>, key: &str, channel: &str) {
    let key = key.trim();
    if key.is_empty() {
        return;
    }
    pairs.push((key.to_string(), channel.to_string()));
}
