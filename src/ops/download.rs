use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{IoResultExt, Result};
use crate::transport::Connector;

/// a file fetched into the workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    /// path as scanned on the source
    pub remote: String,
    /// where it was written
    pub local: PathBuf,
}

/// fetch every scanned path into `workspace`
///
/// paths for which `skip` returns true are left out. parent directories are
/// created as needed. the first failing fetch aborts the download.
pub fn download(
    connector: &mut dyn Connector,
    workspace: &Path,
    paths: &[String],
    skip: impl Fn(&str) -> bool,
) -> Result<Vec<StagedFile>> {
    let mut written = Vec::with_capacity(paths.len());

    for path in paths {
        if skip(path) {
            log::debug!("skipping housekeeping entry {}", path);
            continue;
        }

        let local = workspace.join(path.trim_start_matches('/'));
        if let Some(parent) = local.parent() {
            fs::create_dir_all(parent).with_path(parent)?;
        }

        log::info!("downloading file from the source repository: {}", path);
        connector.fetch(path, &local)?;
        written.push(StagedFile {
            remote: path.clone(),
            local,
        });
    }

    Ok(written)
}
