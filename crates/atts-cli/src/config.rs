//! Harness configuration and host inventory loading.

use atts_core::{HostInfo, HostInventory};
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised while loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Harness settings, read from `atts.yml`.
///
/// Every field has a default, so an empty or missing file is valid.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Directory of host description files.
    pub hosts_dir: PathBuf,
    /// Private key used for every host.
    pub key_file: PathBuf,
    pub remote_user: String,
    /// Local copies of fetched files and received payloads.
    pub tmp_dir: PathBuf,
    /// Output directory of the HTML report.
    pub report_dir: PathBuf,
    pub scripts_dir: PathBuf,
    /// UCI configurations installed by the test cases.
    pub config_dir: PathBuf,
    /// Payload files for the transfer cases.
    pub mocks_dir: PathBuf,
    /// Archive of earlier test runs read by the log reports.
    pub log_archive_dir: Option<PathBuf>,
    /// Pause between two payload transfers.
    pub settle_delay_secs: u64,
    /// Pause after the last transfer, letting the daemons drop connections.
    pub drain_delay_secs: u64,
    /// gnuplot binary.
    pub gnuplot: String,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            hosts_dir: PathBuf::from("data/hosts"),
            key_file: PathBuf::from("data/keys/id_dsa"),
            remote_user: "root".to_string(),
            tmp_dir: PathBuf::from("data/tmp"),
            report_dir: PathBuf::from("data/htdocs"),
            scripts_dir: PathBuf::from("data/scripts"),
            config_dir: PathBuf::from("data/config"),
            mocks_dir: PathBuf::from("data/mocks"),
            log_archive_dir: None,
            settle_delay_secs: 5,
            drain_delay_secs: 10,
            gnuplot: "gnuplot".to_string(),
        }
    }
}

impl HarnessConfig {
    /// Loads the configuration, falling back to defaults when `path` does
    /// not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!("No configuration at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }

    pub fn drain_delay(&self) -> Duration {
        Duration::from_secs(self.drain_delay_secs)
    }

    pub fn script(&self, name: &str) -> PathBuf {
        self.scripts_dir.join(name)
    }

    pub fn uci_config(&self, name: &str) -> PathBuf {
        self.config_dir.join(name)
    }

    pub fn mock(&self, name: &str) -> PathBuf {
        self.mocks_dir.join(name)
    }
}

/// On-disk host description.
///
/// ```yaml
/// main:
///   name: node1
///   disable: 1
/// network:
///   ip: 10.0.0.1
/// ```
#[derive(Debug, Deserialize)]
struct HostFile {
    main: MainSection,
    network: NetworkSection,
}

#[derive(Debug, Deserialize)]
struct MainSection {
    name: String,
    #[serde(default, deserialize_with = "disable_flag")]
    disable: bool,
}

#[derive(Debug, Deserialize)]
struct NetworkSection {
    ip: String,
}

/// Accepts `true`, `1` and `"1"` as set.
fn disable_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_yaml::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_yaml::Value::Bool(b) => b,
        serde_yaml::Value::Number(n) => n.as_i64() == Some(1),
        serde_yaml::Value::String(s) => s.trim() == "1" || s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    })
}

/// Parses one host description.
pub fn parse_host(content: &str) -> Result<HostInfo, serde_yaml::Error> {
    let file: HostFile = serde_yaml::from_str(content)?;
    Ok(HostInfo {
        name: file.main.name,
        address: file.network.ip,
        disabled: file.main.disable,
    })
}

/// Loads every non-hidden file of `dir` as a host, sorted by file name.
pub fn load_inventory(dir: &Path) -> Result<HostInventory, ConfigError> {
    let read_err = |source| ConfigError::Read {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if !hidden && entry.path().is_file() {
            paths.push(entry.path());
        }
    }
    paths.sort();

    let mut hosts = Vec::with_capacity(paths.len());
    for path in paths {
        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let host = parse_host(&content).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        debug!("Loaded host {} from {}", host, path.display());
        hosts.push(host);
    }
    Ok(HostInventory::new(hosts))
}
