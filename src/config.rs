//! Application configuration management.
//!
//! Settings are layered with figment, later layers winning:
//!
//! 1. Built-in defaults ([`Config::default`])
//! 2. TOML file (platform config dir, or `--config FILE`)
//! 3. `DUPSWEEP_*` environment variables (e.g. `DUPSWEEP_WORKERS=8`)
//! 4. CLI flags, applied by the caller after loading
//!
//! ```toml
//! workers = 4
//! buffer_size = 65536
//! destination = "/tmp/dupes"
//! skip_hidden = true
//! ignore_patterns = ["*.log", "target/"]
//! respect_gitignore = false
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::scanner::DEFAULT_BUFFER_SIZE;

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "DUPSWEEP_";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of workers, coordinator included.
    pub workers: usize,
    /// Read buffer size for fingerprinting, in bytes.
    pub buffer_size: usize,
    /// Directory that receives relocated duplicates.
    pub destination: Option<PathBuf>,
    /// Skip hidden files and directories.
    pub skip_hidden: bool,
    /// Gitignore-style patterns to exclude.
    pub ignore_patterns: Vec<String>,
    /// Honour a `.gitignore` file at the scan root.
    pub respect_gitignore: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: 1,
            buffer_size: DEFAULT_BUFFER_SIZE,
            destination: None,
            skip_hidden: false,
            ignore_patterns: Vec::new(),
            respect_gitignore: false,
        }
    }
}

impl Config {
    /// Load defaults, the platform config file (if any) and the environment.
    ///
    /// A broken config file is logged and ignored rather than aborting.
    #[must_use]
    pub fn load() -> Self {
        let path = Self::config_path().ok();
        match Self::load_from(path.as_deref()) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Failed to load config, using defaults: {:#}", e);
                Self::default()
            }
        }
    }

    /// Load defaults, an optional TOML file and the environment.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but is not valid TOML, or a value has the
    /// wrong type.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        Self::figment(path)
            .extract()
            .context("Invalid configuration")
    }

    /// The figment behind [`Config::load_from`].
    #[must_use]
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            log::debug!("Reading config from {}", path.display());
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    /// Save the configuration to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Save the configuration to the default platform-specific path.
    ///
    /// # Errors
    ///
    /// Fails if no config directory exists for this platform or the file
    /// cannot be written.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Get the default platform-specific configuration path.
    ///
    /// # Errors
    ///
    /// Fails if the platform has no home directory.
    pub fn config_path() -> Result<PathBuf> {
        let project_dirs = ProjectDirs::from("org", "dupsweep", "dupsweep")
            .ok_or_else(|| anyhow::anyhow!("Failed to determine project directories"))?;
        Ok(project_dirs.config_dir().join("config.toml"))
    }
}
