//! repository locations and the credentials used to reach them

use std::fmt;
use std::path::PathBuf;

use url::Url;

use crate::error::{Error, Result};

/// a source or target repository
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepositoryEndpoint {
    /// repository id, used for credential lookup
    pub id: String,
    /// url as given by the caller
    pub url: String,
    /// url scheme (`file`, `scp`, `ssh`)
    pub protocol: String,
    /// host for remote protocols
    pub host: Option<String>,
    /// port given in the url
    pub port: Option<u16>,
    /// user given in the url
    pub username: Option<String>,
    /// repository root on the host
    pub base_directory: String,
}

impl RepositoryEndpoint {
    /// parse a repository url
    pub fn parse(id: impl Into<String>, url: &str) -> Result<Self> {
        let id = id.into();
        let parsed = Url::parse(url).map_err(|e| Error::InvalidEndpoint {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let protocol = parsed.scheme().to_string();

        let base_directory = if protocol == "file" {
            let path = parsed.to_file_path().map_err(|_| Error::InvalidEndpoint {
                url: url.to_string(),
                message: "not a local path".to_string(),
            })?;
            path.to_string_lossy().into_owned()
        } else {
            normalize_remote_path(parsed.path())
        };

        let username = match parsed.username() {
            "" => None,
            u => Some(u.to_string()),
        };

        Ok(Self {
            id,
            url: url.to_string(),
            protocol,
            host: parsed.host_str().map(|h| h.to_string()),
            port: parsed.port(),
            username,
            base_directory,
        })
    }

    /// join a repository-relative path onto the base directory
    pub fn remote_path(&self, relative: &str) -> String {
        let relative = relative.trim_start_matches('/');
        if relative.is_empty() {
            return self.base_directory.clone();
        }
        format!("{}/{}", self.base_directory.trim_end_matches('/'), relative)
    }
}

impl fmt::Display for RepositoryEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.url)
    }
}

// `scp://host//srv/repo` and `scp://host/srv/repo` name the same directory
fn normalize_remote_path(path: &str) -> String {
    let trimmed = path.trim_start_matches('/');
    let mut normalized = format!("/{}", trimmed);
    while normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }
    normalized
}

/// authentication details for a repository
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: Option<String>,
    pub port: Option<u16>,
    pub identity_file: Option<PathBuf>,
}

/// looks up credentials by repository id
pub trait CredentialSource {
    fn credentials(&self, id: &str) -> Option<Credentials>;
}

/// credential source that knows nothing
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCredentials;

impl CredentialSource for NoCredentials {
    fn credentials(&self, _id: &str) -> Option<Credentials> {
        None
    }
}
