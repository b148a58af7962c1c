//! Configuration loaded from `<home>/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::paths::{CONFIG_FILE, HOME_ENV, Layout, PREFIX_ENV, try_pour_home};

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("IO error reading {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`Config`].
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: toml::de::Error,
    },

    /// Neither `POUR_HOME` nor a home directory is available.
    #[error("could not determine home directory; set {HOME_ENV}")]
    NoHome,
}

/// pour configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Install settings.
    #[serde(default)]
    pub install: InstallConfig,

    /// Network settings.
    #[serde(default)]
    pub network: NetworkConfig,
}

/// Install settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallConfig {
    /// Root that install targets resolve under. Defaults to the state directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<PathBuf>,
}

/// Network settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Override for the `User-Agent` header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: None,
        }
    }
}

const fn default_timeout_secs() -> u64 {
    60
}

impl NetworkConfig {
    /// Request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Effective `User-Agent` header value.
    pub fn user_agent(&self) -> &str {
        self.user_agent.as_deref().unwrap_or(crate::USER_AGENT)
    }
}

impl Config {
    /// Load config from a TOML file; a missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but can't be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Resolve the layout: `POUR_PREFIX` wins over `install.prefix`, which wins
    /// over the state directory itself.
    pub fn layout(&self, home: &Path) -> Layout {
        let prefix = std::env::var_os(PREFIX_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| self.install.prefix.clone())
            .unwrap_or_else(|| home.to_path_buf());
        Layout::new(home, prefix)
    }
}

/// Discover the state directory, load its config, and resolve the layout.
///
/// # Errors
///
/// Returns [`ConfigError::NoHome`] if no state directory can be determined,
/// or a load error from [`Config::load`].
pub fn load_from_env() -> Result<(Config, Layout), ConfigError> {
    let home = try_pour_home().ok_or(ConfigError::NoHome)?;
    let config = Config::load(&home.join(CONFIG_FILE))?;
    let layout = config.layout(&home);
    tracing::debug!(home = %layout.home().display(), prefix = %layout.prefix().display(), "resolved layout");
    Ok((config, layout))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.network.timeout_secs, 60);
        assert_eq!(config.network.user_agent(), crate::USER_AGENT);
    }

    #[test]
    fn parses_prefix_and_network() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            "[install]\nprefix = \"/opt/pour\"\n\n[network]\ntimeout_secs = 5\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.install.prefix, Some(PathBuf::from("/opt/pour")));
        assert_eq!(config.network.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[install\n").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse { .. })));
    }
}
