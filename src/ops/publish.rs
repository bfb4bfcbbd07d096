use std::path::Path;

use crate::error::{Error, Result};
use crate::transport::{RemoteCommand, Session};

/// upload the archive and activate it on the target
///
/// the target must be able to execute commands; this is checked before
/// anything is uploaded. after the upload the archive is unpacked, deleted,
/// the rename script is run from the base directory and deleted. the first
/// failing step aborts and nothing already done is undone.
pub fn publish(mut session: Session, archive: &Path, script_name: &str) -> Result<()> {
    let connector = session.connector();
    let endpoint = connector
        .endpoint()
        .cloned()
        .ok_or(Error::NotConnected)?;

    if connector.command_executor().is_none() {
        return Err(Error::CommandsUnsupported(endpoint.id.clone()));
    }

    let archive_name = archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::Io {
            path: archive.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "archive has no file name"),
        })?;

    log::info!("uploading {} to {}", archive_name, endpoint);
    connector.store(archive, &archive_name)?;

    let base = endpoint.base_directory.clone();
    let remote_archive = endpoint.remote_path(&archive_name);
    let remote_script = endpoint.remote_path(script_name);

    let steps = [
        RemoteCommand::UnpackArchive {
            archive: remote_archive.clone(),
            destination: base.clone(),
        },
        RemoteCommand::DeleteFile {
            path: remote_archive,
        },
        RemoteCommand::RunScript {
            script: remote_script.clone(),
            working_dir: base,
        },
        RemoteCommand::DeleteFile {
            path: remote_script,
        },
    ];

    let executor = connector
        .command_executor()
        .ok_or_else(|| Error::CommandsUnsupported(endpoint.id.clone()))?;

    for step in &steps {
        log::info!("{} on {}", step, endpoint.id);
        let status = executor.execute(step)?;
        if status != 0 {
            return Err(Error::RemoteCommand {
                command: step.to_string(),
                status,
            });
        }
    }

    session.close()
}
