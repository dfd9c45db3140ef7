use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

const CONFIG_DIR_NAME: &str = "usage-meter";
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Where the database and pricing defaults live.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    pub timezone: String,
    pub log_level: String,
    /// Directory holding `auth-files.json` and one `<endpoint>.json` per
    /// credential listing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_dir: Option<PathBuf>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            timezone: "UTC".to_string(),
            log_level: "info".to_string(),
            upstream_dir: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: CliConfig,
    pub file: PathBuf,
    pub created: bool,
}

/// Reads the config file, writing one with defaults when it does not exist.
pub fn load_or_create(path: Option<&Path>) -> Result<ConfigLoad, String> {
    let file = match path {
        Some(path) => path.to_path_buf(),
        None => config_dir()?.join(CONFIG_FILE_NAME),
    };

    if file.exists() {
        let contents = fs::read_to_string(&file)
            .map_err(|err| format!("read config {}: {}", file.display(), err))?;
        let config: CliConfig = toml::from_str(&contents)
            .map_err(|err| format!("parse config {}: {}", file.display(), err))?;
        return Ok(ConfigLoad {
            config,
            file,
            created: false,
        });
    }

    if let Some(dir) = file.parent() {
        fs::create_dir_all(dir)
            .map_err(|err| format!("create config dir {}: {}", dir.display(), err))?;
    }
    let config = CliConfig::default();
    let contents =
        toml::to_string_pretty(&config).map_err(|err| format!("serialize config: {}", err))?;
    fs::write(&file, contents)
        .map_err(|err| format!("write config {}: {}", file.display(), err))?;

    Ok(ConfigLoad {
        config,
        file,
        created: true,
    })
}

fn config_dir() -> Result<PathBuf, String> {
    if let Some(dir) = std::env::var_os("XDG_CONFIG_HOME").filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(dir).join(CONFIG_DIR_NAME));
    }
    let home = std::env::var("HOME").map_err(|err| format!("resolve HOME: {}", err))?;
    Ok(PathBuf::from(home).join(".config").join(CONFIG_DIR_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let file = dir.path().join("nested").join("config.toml");

        let first = load_or_create(Some(&file)).expect("create");
        assert!(first.created);
        assert_eq!(first.config, CliConfig::default());

        let second = load_or_create(Some(&file)).expect("reload");
        assert!(!second.created);
        assert_eq!(second.config, CliConfig::default());
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let dir = tempfile::tempdir().expect("temp dir");
        let file = dir.path().join("config.toml");
        fs::write(&file, "timezone = \"Asia/Shanghai\"\nupstream_dir = \"/srv/proxy\"\n")
            .expect("write config");

        let loaded = load_or_create(Some(&file)).expect("load");
        assert_eq!(loaded.config.timezone, "Asia/Shanghai");
        assert_eq!(loaded.config.log_level, "info");
        assert_eq!(loaded.config.upstream_dir, Some(PathBuf::from("/srv/proxy")));
        assert_eq!(loaded.config.data_dir, None);
    }
}
