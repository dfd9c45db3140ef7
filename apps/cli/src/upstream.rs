use std::fs;
use std::path::{Path, PathBuf};

use ingest::{FetchError, UpstreamSource};
use meter_core::CredentialKind;
use serde_json::Value;

const AUTH_FILES_NAME: &str = "auth-files.json";

/// Upstream backed by JSON snapshots of the proxy's management endpoints.
/// Without a directory every fetch is unavailable and ingestion falls back
/// to raw sources.
#[derive(Debug, Clone, Default)]
pub struct FileUpstream {
    dir: Option<PathBuf>,
}

impl FileUpstream {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    fn read(&self, name: &str) -> Result<Value, FetchError> {
        let Some(dir) = &self.dir else {
            return Err(FetchError::Unavailable("no upstream_dir configured".to_string()));
        };
        read_snapshot(&dir.join(name))
    }
}

impl UpstreamSource for FileUpstream {
    fn fetch_auth_files(&self) -> Result<Value, FetchError> {
        self.read(AUTH_FILES_NAME)
    }

    fn fetch_credentials(&self, kind: CredentialKind) -> Result<Value, FetchError> {
        self.read(&format!("{}.json", kind.endpoint()))
    }
}

fn read_snapshot(path: &Path) -> Result<Value, FetchError> {
    let raw = fs::read_to_string(path)
        .map_err(|err| FetchError::Unavailable(format!("{}: {}", path.display(), err)))?;
    serde_json::from_str(&raw)
        .map_err(|err| FetchError::Invalid(format!("{}: {}", path.display(), err)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshots_are_read_per_endpoint() {
        let dir = tempfile::tempdir().expect("temp dir");
        fs::write(dir.path().join("auth-files.json"), r#"{"files": []}"#).expect("auth");
        fs::write(dir.path().join("gemini-api-key.json"), "not json").expect("gemini");
        let upstream = FileUpstream::new(Some(dir.path().to_path_buf()));

        assert!(upstream.fetch_auth_files().is_ok());
        assert!(matches!(
            upstream.fetch_credentials(CredentialKind::Gemini),
            Err(FetchError::Invalid(_))
        ));
        assert!(matches!(
            upstream.fetch_credentials(CredentialKind::Claude),
            Err(FetchError::Unavailable(_))
        ));
        assert!(FileUpstream::new(None).fetch_auth_files().is_err());
    }
}
