//! transport layer for remote repository access
//!
//! the copy core only talks to [`Connector`]. each protocol is one
//! implementation; commands on the target are expressed as
//! [`RemoteCommand`] intents that the connector renders for its host.

pub mod local;
pub mod ssh;

use std::fmt;
use std::path::Path;

use crate::endpoint::{Credentials, RepositoryEndpoint};
use crate::error::{Error, Result};

pub use local::LocalConnector;
pub use ssh::SshConnector;

/// result of listing a repository path
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Listing {
    /// the path is a directory with these child names
    Entries(Vec<String>),
    /// the path is a file
    Leaf,
}

/// a command the publish sequence needs run on the target host
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoteCommand {
    /// quietly unpack `archive` into `destination`, overwriting existing files
    UnpackArchive { archive: String, destination: String },
    /// delete `path`, succeeding if it is already gone
    DeleteFile { path: String },
    /// run the shell script `script` from `working_dir`
    RunScript { script: String, working_dir: String },
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteCommand::UnpackArchive {
                archive,
                destination,
            } => write!(f, "unpack {} into {}", archive, destination),
            RemoteCommand::DeleteFile { path } => write!(f, "delete {}", path),
            RemoteCommand::RunScript {
                script,
                working_dir,
            } => write!(f, "run {} in {}", script, working_dir),
        }
    }
}

/// capability to run commands on the connected host
pub trait CommandExecutor {
    /// run a command, returning its exit status
    fn execute(&mut self, command: &RemoteCommand) -> Result<i32>;
}

/// access to one repository over some protocol
pub trait Connector {
    /// open the connection
    fn connect(&mut self, endpoint: &RepositoryEndpoint, credentials: Option<&Credentials>)
        -> Result<()>;

    /// list a repository-relative path
    fn list_entries(&mut self, path: &str) -> Result<Listing>;

    /// copy a repository-relative file to `local_path`
    ///
    /// fails with [`Error::NotFound`] if the file does not exist.
    fn fetch(&mut self, remote_path: &str, local_path: &Path) -> Result<()>;

    /// copy `local_path` to a repository-relative name
    fn store(&mut self, local_path: &Path, remote_name: &str) -> Result<()>;

    /// command runner, if this transport can execute commands
    fn command_executor(&mut self) -> Option<&mut dyn CommandExecutor> {
        None
    }

    /// close the connection; calling it twice is harmless
    fn disconnect(&mut self) -> Result<()>;

    /// the endpoint this connector is attached to
    fn endpoint(&self) -> Option<&RepositoryEndpoint>;
}

/// builds a connector for an endpoint
pub trait ConnectorProvider {
    fn connector_for(&self, endpoint: &RepositoryEndpoint) -> Result<Box<dyn Connector>>;
}

/// maps url schemes to the connectors shipped with stagehand
#[derive(Clone, Copy, Debug, Default)]
pub struct TransportRegistry;

impl ConnectorProvider for TransportRegistry {
    fn connector_for(&self, endpoint: &RepositoryEndpoint) -> Result<Box<dyn Connector>> {
        match endpoint.protocol.as_str() {
            "file" => Ok(Box::new(LocalConnector::new())),
            "scp" | "ssh" => Ok(Box::new(SshConnector::new())),
            other => Err(Error::UnsupportedProtocol {
                id: endpoint.id.clone(),
                protocol: other.to_string(),
            }),
        }
    }
}

/// a connected connector that is disconnected when dropped
pub struct Session {
    connector: Box<dyn Connector>,
    open: bool,
}

impl Session {
    /// connect `connector` to `endpoint`
    pub fn open(
        mut connector: Box<dyn Connector>,
        endpoint: &RepositoryEndpoint,
        credentials: Option<&Credentials>,
    ) -> Result<Self> {
        connector.connect(endpoint, credentials)?;
        Ok(Self {
            connector,
            open: true,
        })
    }

    /// the underlying connector
    pub fn connector(&mut self) -> &mut dyn Connector {
        self.connector.as_mut()
    }

    /// disconnect, reporting any error
    pub fn close(mut self) -> Result<()> {
        self.open = false;
        self.connector.disconnect()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.open {
            if let Err(e) = self.connector.disconnect() {
                log::warn!("failed to disconnect: {}", e);
            }
        }
    }
}
