//! SSH transport for remote repositories
//!
//! drives the system OpenSSH client: `ssh` for listings and commands,
//! `scp` for file transfer.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use crate::endpoint::{Credentials, RepositoryEndpoint};
use crate::error::{Error, Result};
use crate::transport::{CommandExecutor, Connector, Listing, RemoteCommand};

// exit codes of the listing and fetch probes: the path exists but is not
// the kind asked for, or does not exist at all
const PROBE_OTHER_KIND: i32 = 3;
const PROBE_MISSING: i32 = 4;

/// where and how to reach the remote host
#[derive(Clone, Debug, PartialEq, Eq)]
struct SshTarget {
    ssh_program: PathBuf,
    scp_program: PathBuf,
    host: String,
    user: Option<String>,
    port: Option<u16>,
    identity_file: Option<PathBuf>,
    base_directory: String,
}

impl SshTarget {
    fn new(
        endpoint: &RepositoryEndpoint,
        credentials: Option<&Credentials>,
        programs: &Programs,
    ) -> Result<Self> {
        let host = endpoint.host.clone().ok_or_else(|| Error::InvalidEndpoint {
            url: endpoint.url.clone(),
            message: "missing host".to_string(),
        })?;

        // url values take precedence over configured ones
        let user = endpoint
            .username
            .clone()
            .or_else(|| credentials.and_then(|c| c.username.clone()));
        let port = endpoint.port.or_else(|| credentials.and_then(|c| c.port));
        let identity_file = credentials.and_then(|c| c.identity_file.clone());

        Ok(Self {
            ssh_program: programs.ssh.clone(),
            scp_program: programs.scp.clone(),
            host,
            user,
            port,
            identity_file,
            base_directory: endpoint.base_directory.clone(),
        })
    }

    fn ssh(&self) -> Command {
        let mut cmd = Command::new(&self.ssh_program);
        cmd.arg("-o").arg("BatchMode=yes");
        if let Some(port) = self.port {
            cmd.arg("-p").arg(port.to_string());
        }
        if let Some(identity) = &self.identity_file {
            cmd.arg("-i").arg(identity);
        }
        if let Some(user) = &self.user {
            cmd.arg("-l").arg(user);
        }
        cmd.arg(&self.host);
        cmd
    }

    fn scp(&self) -> Command {
        let mut cmd = Command::new(&self.scp_program);
        cmd.arg("-q").arg("-B");
        if let Some(port) = self.port {
            cmd.arg("-P").arg(port.to_string());
        }
        if let Some(identity) = &self.identity_file {
            cmd.arg("-i").arg(identity);
        }
        cmd
    }

    /// `user@host:path` argument for scp
    fn scp_location(&self, path: &str) -> String {
        match &self.user {
            Some(u) => format!("{}@{}:{}", u, self.host, path),
            None => format!("{}:{}", self.host, path),
        }
    }

    fn absolute(&self, relative: &str) -> String {
        let relative = relative.trim_start_matches('/');
        if relative.is_empty() {
            self.base_directory.clone()
        } else {
            format!("{}/{}", self.base_directory.trim_end_matches('/'), relative)
        }
    }

    fn run(&self, remote_cmd: &str) -> Result<Output> {
        log::debug!("ssh {}: {}", self.host, remote_cmd);
        self.ssh()
            .arg(remote_cmd)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| Error::Transport {
                message: format!("failed to spawn ssh: {}", e),
            })
    }

    fn status(&self, remote_cmd: &str) -> Result<i32> {
        let output = self.run(remote_cmd)?;
        Ok(output.status.code().unwrap_or(-1))
    }

    /// copy with scp, failing with its stderr on a non-zero exit
    fn copy(&self, from: impl AsRef<OsStr>, to: impl AsRef<OsStr>, what: &str) -> Result<()> {
        let output = self
            .scp()
            .arg(from)
            .arg(to)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| Error::Transport {
                message: format!("failed to spawn scp: {}", e),
            })?;

        if !output.status.success() {
            return Err(failure(what, &output));
        }
        Ok(())
    }
}

/// client binaries used to reach the host
#[derive(Clone, Debug, PartialEq, Eq)]
struct Programs {
    ssh: PathBuf,
    scp: PathBuf,
}

impl Default for Programs {
    fn default() -> Self {
        Self {
            ssh: PathBuf::from("ssh"),
            scp: PathBuf::from("scp"),
        }
    }
}

/// transport error for a failed ssh or scp run, carrying its stderr
fn failure(what: &str, output: &Output) -> Error {
    let status = output
        .status
        .code()
        .map_or_else(|| "a signal".to_string(), |c| format!("status {}", c));
    Error::Transport {
        message: format!(
            "{} failed with {}: {}",
            what,
            status,
            String::from_utf8_lossy(&output.stderr).trim()
        ),
    }
}

/// connector for `scp://` and `ssh://` repositories
#[derive(Debug, Default)]
pub struct SshConnector {
    programs: Programs,
    target: Option<SshTarget>,
    endpoint: Option<RepositoryEndpoint>,
}

impl SshConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// use these binaries instead of `ssh` and `scp` from `PATH`
    pub fn with_programs(ssh: impl Into<PathBuf>, scp: impl Into<PathBuf>) -> Self {
        Self {
            programs: Programs {
                ssh: ssh.into(),
                scp: scp.into(),
            },
            ..Self::default()
        }
    }

    fn target(&self) -> Result<&SshTarget> {
        self.target.as_ref().ok_or(Error::NotConnected)
    }
}

impl Connector for SshConnector {
    fn connect(
        &mut self,
        endpoint: &RepositoryEndpoint,
        credentials: Option<&Credentials>,
    ) -> Result<()> {
        let target = SshTarget::new(endpoint, credentials, &self.programs)?;

        let output = target.run("true")?;
        if !output.status.success() {
            return Err(failure(&format!("connecting to {}", target.host), &output));
        }

        self.target = Some(target);
        self.endpoint = Some(endpoint.clone());
        Ok(())
    }

    fn list_entries(&mut self, path: &str) -> Result<Listing> {
        let target = self.target()?;
        let dir = quote(&target.absolute(path))?;
        let probe = format!(
            "if [ -d {dir} ]; then ls -1A {dir}; elif [ -e {dir} ]; then exit {}; else exit {}; fi",
            PROBE_OTHER_KIND, PROBE_MISSING
        );

        let output = target.run(&probe)?;
        match output.status.code() {
            Some(0) => Ok(Listing::Entries(parse_listing(&output.stdout))),
            Some(PROBE_OTHER_KIND) => Ok(Listing::Leaf),
            Some(PROBE_MISSING) => Err(Error::NotFound(path.to_string())),
            _ => Err(failure(&format!("listing {}", path), &output)),
        }
    }

    fn fetch(&mut self, remote_path: &str, local_path: &Path) -> Result<()> {
        let target = self.target()?;
        let remote = target.absolute(remote_path);
        let file = quote(&remote)?;

        // only a clean "missing" answer from the remote shell is NotFound;
        // ssh itself exits 255 when the connection fails
        let probe = format!(
            "if [ -f {file} ]; then exit 0; elif [ -e {file} ]; then exit {}; else exit {}; fi",
            PROBE_OTHER_KIND, PROBE_MISSING
        );
        let output = target.run(&probe)?;
        match output.status.code() {
            Some(0) => {}
            Some(PROBE_MISSING) => return Err(Error::NotFound(remote_path.to_string())),
            Some(PROBE_OTHER_KIND) => {
                return Err(Error::Transport {
                    message: format!("{} is not a regular file", remote),
                })
            }
            _ => return Err(failure(&format!("checking {}", remote), &output)),
        }

        target.copy(
            target.scp_location(&remote),
            local_path,
            &format!("downloading {}", remote),
        )
    }

    fn store(&mut self, local_path: &Path, remote_name: &str) -> Result<()> {
        let target = self.target()?;
        let remote = target.absolute(remote_name);

        if let Some((parent, _)) = remote.rsplit_once('/') {
            if !parent.is_empty() {
                let output = target.run(&format!("mkdir -p {}", quote(parent)?))?;
                if !output.status.success() {
                    return Err(failure(&format!("creating {}", parent), &output));
                }
            }
        }

        target.copy(
            local_path,
            target.scp_location(&remote),
            &format!("uploading {}", local_path.display()),
        )
    }

    fn command_executor(&mut self) -> Option<&mut dyn CommandExecutor> {
        Some(self)
    }

    fn disconnect(&mut self) -> Result<()> {
        // every call is its own ssh process, nothing is held open
        self.target = None;
        Ok(())
    }

    fn endpoint(&self) -> Option<&RepositoryEndpoint> {
        self.endpoint.as_ref()
    }
}

impl CommandExecutor for SshConnector {
    fn execute(&mut self, command: &RemoteCommand) -> Result<i32> {
        let target = self.target()?;
        target.status(&render(command)?)
    }
}

/// render a command intent as a POSIX shell line
pub fn render(command: &RemoteCommand) -> Result<String> {
    let line = match command {
        // -qq: verbose unzip output has stalled slow remote shells
        RemoteCommand::UnpackArchive {
            archive,
            destination,
        } => format!("unzip -o -qq -d {} {}", quote(destination)?, quote(archive)?),
        RemoteCommand::DeleteFile { path } => format!("rm -f {}", quote(path)?),
        RemoteCommand::RunScript {
            script,
            working_dir,
        } => format!("cd {} && sh {}", quote(working_dir)?, quote(script)?),
    };
    Ok(line)
}

fn quote(s: &str) -> Result<String> {
    shlex::try_quote(s)
        .map(|q| q.into_owned())
        .map_err(|e| Error::Transport {
            message: format!("cannot quote {:?} for the remote shell: {}", s, e),
        })
}

fn parse_listing(stdout: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.is_empty())
        .map(|l| l.to_string())
        .collect()
}
