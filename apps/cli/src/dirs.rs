use std::path::{Path, PathBuf};

const DATA_DIR_NAME: &str = "usage-meter";

/// Configured data dir, else `$XDG_DATA_HOME/usage-meter`, else
/// `$HOME/.local/share/usage-meter`.
pub fn resolve_data_dir(configured: Option<&Path>) -> Result<PathBuf, String> {
    if let Some(dir) = configured {
        return Ok(dir.to_path_buf());
    }
    if let Some(dir) = std::env::var_os("XDG_DATA_HOME").filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(dir).join(DATA_DIR_NAME));
    }
    let home = std::env::var("HOME").map_err(|err| format!("resolve HOME: {}", err))?;
    Ok(PathBuf::from(home)
        .join(".local")
        .join("share")
        .join(DATA_DIR_NAME))
}
