//! Config path resolution

use std::ffi::OsString;
use std::path::PathBuf;

use super::ConfigResult;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "RESREC_CONFIG";

/// File name used when the environment does not name one
pub const DEFAULT_CONFIG_FILE: &str = "resrec.toml";

/// Returns the config file path.
///
/// `$RESREC_CONFIG` when set and non-empty, else `resrec.toml` in the
/// current directory.
pub fn config_path() -> ConfigResult<PathBuf> {
    resolve(std::env::var_os(CONFIG_ENV), std::env::current_dir)
}

fn resolve(
    from_env: Option<OsString>,
    current_dir: impl FnOnce() -> std::io::Result<PathBuf>,
) -> ConfigResult<PathBuf> {
    match from_env {
        Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
        _ => Ok(current_dir()?.join(DEFAULT_CONFIG_FILE)),
    }
}
