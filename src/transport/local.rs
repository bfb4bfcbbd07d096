//! local file transport for repository operations

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::endpoint::{Credentials, RepositoryEndpoint};
use crate::error::{Error, IoResultExt, Result};
use crate::transport::{CommandExecutor, Connector, Listing, RemoteCommand};

/// connector for `file://` repositories
///
/// commands are carried out in-process, except the rename script which is
/// handed to `sh`.
#[derive(Debug, Default)]
pub struct LocalConnector {
    endpoint: Option<RepositoryEndpoint>,
    root: Option<PathBuf>,
}

impl LocalConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn root(&self) -> Result<&Path> {
        self.root.as_deref().ok_or(Error::NotConnected)
    }

    /// resolve a repository-relative path under the root
    fn resolve(&self, relative: &str) -> Result<PathBuf> {
        let relative = relative.trim_start_matches('/');
        let root = self.root()?;
        if relative.is_empty() {
            Ok(root.to_path_buf())
        } else {
            Ok(root.join(relative))
        }
    }
}

impl Connector for LocalConnector {
    fn connect(
        &mut self,
        endpoint: &RepositoryEndpoint,
        _credentials: Option<&Credentials>,
    ) -> Result<()> {
        let root = PathBuf::from(&endpoint.base_directory);
        if !root.is_dir() {
            return Err(Error::NotFound(endpoint.base_directory.clone()));
        }
        self.root = Some(root);
        self.endpoint = Some(endpoint.clone());
        Ok(())
    }

    fn list_entries(&mut self, path: &str) -> Result<Listing> {
        let dir = self.resolve(path)?;
        let meta = match fs::metadata(&dir) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::NotFound(path.to_string()))
            }
            Err(e) => return Err(Error::Io { path: dir, source: e }),
        };

        if !meta.is_dir() {
            return Ok(Listing::Leaf);
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&dir).with_path(&dir)? {
            let entry = entry.with_path(&dir)?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        // read_dir order is arbitrary; keep scans reproducible
        names.sort();

        Ok(Listing::Entries(names))
    }

    fn fetch(&mut self, remote_path: &str, local_path: &Path) -> Result<()> {
        let src = self.resolve(remote_path)?;
        if !src.is_file() {
            return Err(Error::NotFound(remote_path.to_string()));
        }
        if let Some(parent) = local_path.parent() {
            fs::create_dir_all(parent).with_path(parent)?;
        }
        fs::copy(&src, local_path).with_path(&src)?;
        Ok(())
    }

    fn store(&mut self, local_path: &Path, remote_name: &str) -> Result<()> {
        let dst = self.resolve(remote_name)?;
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent).with_path(parent)?;
        }
        fs::copy(local_path, &dst).with_path(&dst)?;
        Ok(())
    }

    fn command_executor(&mut self) -> Option<&mut dyn CommandExecutor> {
        Some(self)
    }

    fn disconnect(&mut self) -> Result<()> {
        self.root = None;
        Ok(())
    }

    fn endpoint(&self) -> Option<&RepositoryEndpoint> {
        self.endpoint.as_ref()
    }
}

impl CommandExecutor for LocalConnector {
    fn execute(&mut self, command: &RemoteCommand) -> Result<i32> {
        self.root()?;

        match command {
            RemoteCommand::UnpackArchive {
                archive,
                destination,
            } => {
                let file = File::open(archive).with_path(archive)?;
                let mut zip = zip::ZipArchive::new(file)?;
                fs::create_dir_all(destination).with_path(destination)?;
                zip.extract(destination)?;
                Ok(0)
            }

            RemoteCommand::DeleteFile { path } => match fs::remove_file(path) {
                Ok(()) => Ok(0),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
                Err(e) => Err(Error::Io {
                    path: PathBuf::from(path),
                    source: e,
                }),
            },

            RemoteCommand::RunScript {
                script,
                working_dir,
            } => {
                let status = Command::new("sh")
                    .arg(script)
                    .current_dir(working_dir)
                    .status()
                    .map_err(|e| Error::Transport {
                        message: format!("failed to run {}: {}", script, e),
                    })?;
                Ok(status.code().unwrap_or(-1))
            }
        }
    }
}
