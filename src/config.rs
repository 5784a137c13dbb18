//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.clusterboard.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the current directory.
pub const CONFIG_FILE: &str = ".clusterboard.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Remote repository settings.
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Local cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

/// Remote repository used as the shared backing store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the contents API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_owner")]
    pub owner: String,

    #[serde(default = "default_repo")]
    pub repo: String,

    #[serde(default = "default_branch")]
    pub branch: String,

    /// Folder inside the repository holding dataset blobs.
    #[serde(default = "default_folder")]
    pub folder: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            owner: default_owner(),
            repo: default_repo(),
            branch: default_branch(),
            folder: default_folder(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_owner() -> String {
    "misterglukosa-sudo".to_string()
}

fn default_repo() -> String {
    "dashboard-activation".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_folder() -> String {
    "uploads".to_string()
}

fn default_timeout() -> u64 {
    30
}

/// Local cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache directory.
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,

    /// Credential file name, relative to the cache directory.
    #[serde(default = "default_token_file")]
    pub token_file: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            token_file: default_token_file(),
        }
    }
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".clusterboard")
}

fn default_token_file() -> String {
    "token".to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref dir) = args.cache_dir {
            self.cache.dir = dir.clone();
        }

        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Path of the persisted credential.
    pub fn token_path(&self) -> PathBuf {
        self.cache.dir.join(&self.cache.token_file)
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.remote.api_url, "https://api.github.com");
        assert_eq!(config.remote.owner, "misterglukosa-sudo");
        assert_eq!(config.remote.repo, "dashboard-activation");
        assert_eq!(config.remote.folder, "uploads");
        assert_eq!(config.remote.timeout_seconds, 30);
        assert_eq!(config.token_path(), PathBuf::from(".clusterboard/token"));
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
verbose = true

[remote]
owner = "acme"
repo = "activations"
timeout_seconds = 10

[cache]
dir = "/var/cache/clusterboard"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert!(config.general.verbose);
        assert_eq!(config.remote.owner, "acme");
        assert_eq!(config.remote.repo, "activations");
        assert_eq!(config.remote.branch, "main");
        assert_eq!(config.remote.timeout_seconds, 10);
        assert_eq!(config.cache.dir, PathBuf::from("/var/cache/clusterboard"));
        assert_eq!(config.cache.token_file, "token");
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[remote]"));
        assert!(toml_str.contains("[cache]"));

        let back: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(back.remote.folder, "uploads");
    }
}
