//! Service credentials and endpoint.
//!
//! Stored as a JSON document, by default at `~/.geosync.json`:
//!
//! ```text
//! { "OSM_User": "...", "OSM_Pass": "...", "OSM_Host": "https://api.openstreetmap.org/" }
//! ```
//!
//! As with the journal, every path-dependent function takes the path
//! explicitly; only [`default_path`] touches the real home directory.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{config_io_err, ConfigError};

/// Endpoint used when the document leaves `OSM_Host` empty.
pub const DEFAULT_HOST: &str = "https://api.openstreetmap.org/";

/// File name of the configuration document inside the home directory.
pub const DEFAULT_FILE_NAME: &str = ".geosync.json";

/// Request timeout used when the document does not set one.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "OSM_User")]
    pub user: String,
    #[serde(rename = "OSM_Pass")]
    pub password: String,
    #[serde(rename = "OSM_Host", default)]
    pub host: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Config {
    /// Build a configuration, falling back to [`DEFAULT_HOST`] for a blank host.
    pub fn new(user: impl Into<String>, password: impl Into<String>, host: &str) -> Self {
        let host = host.trim();
        Self {
            user: user.into(),
            password: password.into(),
            host: if host.is_empty() {
                DEFAULT_HOST.to_string()
            } else {
                host.to_string()
            },
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Service endpoint, never empty.
    pub fn host(&self) -> &str {
        if self.host.trim().is_empty() {
            DEFAULT_HOST
        } else {
            self.host.trim()
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// `<home>/.geosync.json`; pure, no I/O.
pub fn default_path_at(home: &Path) -> PathBuf {
    home.join(DEFAULT_FILE_NAME)
}

/// `~/.geosync.json` for the current user.
pub fn default_path() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
    Ok(default_path_at(&home))
}

/// Load the configuration at `path`.
///
/// Returns `Ok(None)` when the file does not exist, and
/// `ConfigError::Parse` (with path) when it is malformed.
pub fn load(path: &Path) -> Result<Option<Config>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path).map_err(|e| config_io_err(path, e))?;
    let config = serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(config))
}

/// Atomically save the configuration to `path`.
///
/// Write flow: serialize → `.tmp` sibling → `chmod 0600` → `rename`. The file
/// holds a password, so it is never world-readable.
pub fn save(path: &Path, config: &Config) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| config_io_err(dir, e))?;
    }
    let json = serde_json::to_string_pretty(config)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(|e| config_io_err(&tmp, e))?;
    set_file_permissions(&tmp)?;
    std::fs::rename(&tmp, path).map_err(|e| config_io_err(path, e))?;
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| config_io_err(path, e))
}

#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}
