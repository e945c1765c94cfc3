use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::error::{Result, SimtransError};

// Default values for report configuration
fn default_valid_window_secs() -> u64 {
    300
}

fn default_concurrency() -> usize {
    4
}

fn default_ref() -> String {
    "main".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub english: EnglishSourceConfig,
    pub storage: StorageConfig,
    pub report: ReportConfig,
    pub fetch: FetchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnglishSourceConfig {
    /// Where English string files come from: Http or Local
    pub mode: EnglishSourceMode,
    /// Base URL for raw string files, `{base_url}/{repo}/{ref}/{repo}-strings_en.json`
    pub base_url: String,
    /// Root directory holding local repository checkouts
    pub local_root: PathBuf,
    /// Ref used when the catalog does not pin one for a repository
    #[serde(default = "default_ref")]
    pub default_ref: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EnglishSourceMode {
    /// Http: Fetch raw string files from a remote host
    Http,
    /// Local: Read string files from checked out repositories
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory of the durable translation files
    pub translations_dir: PathBuf,
    /// Directory of per-user drafts
    pub drafts_dir: PathBuf,
    /// Simulation catalog JSON file
    pub catalog_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// How long a dirty report object may still be served
    #[serde(default = "default_valid_window_secs")]
    pub valid_window_secs: u64,
    /// Maximum number of simulations computed at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Timeout applied to every upstream fetch
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            english: EnglishSourceConfig {
                mode: EnglishSourceMode::Http,
                base_url: "https://raw.githubusercontent.com/phetsims".to_string(),
                local_root: PathBuf::from("."),
                default_ref: default_ref(),
            },
            storage: StorageConfig {
                translations_dir: PathBuf::from(".simtrans/translations"),
                drafts_dir: PathBuf::from(".simtrans/drafts"),
                catalog_path: PathBuf::from("catalog.json"),
            },
            report: ReportConfig {
                valid_window_secs: default_valid_window_secs(),
                concurrency: default_concurrency(),
            },
            fetch: FetchConfig {
                timeout_secs: 15,
            },
        }
    }
}

impl ReportConfig {
    pub fn valid_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.valid_window_secs).unwrap_or(i64::MAX))
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SimtransError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| SimtransError::Config(format!("Failed to parse config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| SimtransError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| SimtransError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.report.concurrency == 0 {
            return Err(SimtransError::Config("report.concurrency must be at least 1".to_string()));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(SimtransError::Config("fetch.timeout_secs must be at least 1".to_string()));
        }
        Ok(())
    }
}
