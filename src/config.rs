use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::checksum::ChecksumAlgorithm;
use crate::endpoint::{CredentialSource, Credentials};
use crate::error::{IoResultExt, Result};

/// default prefix for the workspace, archive and rename script names
pub const DEFAULT_PREFIX: &str = "stagehand";

/// suffix hiding in-flight version directories on the target
pub const DEFAULT_MARKER: &str = ".rip";

/// copier configuration stored in config.toml
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// prefix for `<prefix>-<version>` workspace, archive and script names
    #[serde(default = "default_prefix")]
    pub workspace_prefix: String,
    /// marker appended to version directories while they are unpacked
    #[serde(default = "default_marker")]
    pub in_process_marker: String,
    /// where staging artifacts are written; system temp dir when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_dir: Option<PathBuf>,
    /// path segments that are never downloaded or archived
    #[serde(default = "default_housekeeping")]
    pub housekeeping: Vec<String>,
    /// sidecar families regenerated for merged metadata
    #[serde(default = "default_checksums")]
    pub checksums: Vec<ChecksumAlgorithm>,
    /// credentials per repository id
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<Server>,
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

fn default_marker() -> String {
    DEFAULT_MARKER.to_string()
}

fn default_checksums() -> Vec<ChecksumAlgorithm> {
    ChecksumAlgorithm::ALL.to_vec()
}

fn default_housekeeping() -> Vec<String> {
    [".svn", ".git", ".hg", "CVS"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Config {
    /// load config from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).with_path(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).with_path(path)?;
        Ok(())
    }

    /// directory holding the workspace, archive and rename script
    pub fn staging_root(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// true if any segment of `path` is a housekeeping entry
    pub fn is_housekeeping(&self, path: &str) -> bool {
        path.split('/')
            .any(|segment| self.housekeeping.iter().any(|h| h == segment))
    }

    /// get server credentials by repository id
    pub fn get_server(&self, id: &str) -> Option<&Server> {
        self.servers.iter().find(|s| s.id == id)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace_prefix: default_prefix(),
            in_process_marker: default_marker(),
            temp_dir: None,
            housekeeping: default_housekeeping(),
            checksums: default_checksums(),
            servers: vec![],
        }
    }
}

impl CredentialSource for Config {
    fn credentials(&self, id: &str) -> Option<Credentials> {
        self.get_server(id).map(|s| Credentials {
            username: s.username.clone(),
            port: s.port,
            identity_file: s.identity_file.clone(),
        })
    }
}

/// credentials for a repository, keyed by its id
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_file: Option<PathBuf>,
}

impl Server {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: None,
            port: None,
            identity_file: None,
        }
    }
}
