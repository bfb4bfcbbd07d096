use std::fs;
use std::io;
use std::path::Path;

use crate::checksum::{write_sidecars, ChecksumAlgorithm};
use crate::error::{Error, Result};
use crate::metadata::{PackageMetadata, METADATA_FILE};
use crate::transport::Connector;

/// outcome of merging staged metadata with the target
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MergeReport {
    /// documents merged with a published copy
    pub merged: Vec<String>,
    /// documents the target did not have yet
    pub new: Vec<String>,
}

/// merge every staged metadata document with the one published on the target
///
/// for `dir/maven-metadata.xml` the published copy is fetched to
/// `dir/maven-metadata.xml<marker>`, the staged document is merged into it,
/// and fresh `.<ext><marker>` sidecars are written for `checksums`. the
/// staged document and its stale sidecars are removed so only the marked
/// copies get archived. documents the target lacks are left untouched.
pub fn merge_all(
    connector: &mut dyn Connector,
    workspace: &Path,
    staged_paths: &[String],
    marker: &str,
    checksums: &[ChecksumAlgorithm],
) -> Result<MergeReport> {
    let mut report = MergeReport::default();

    for path in staged_paths {
        let relative = path.strip_prefix('/').unwrap_or(path);
        if !is_metadata(relative) {
            continue;
        }

        let staged_file = workspace.join(relative);
        let merged_file = workspace.join(format!("{}{}", relative, marker));

        match connector.fetch(relative, &merged_file) {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                log::debug!("no published metadata for {}", relative);
                report.new.push(relative.to_string());
                continue;
            }
            Err(e) => return Err(e),
        }

        if merge_file(&merged_file, &staged_file, marker, checksums)? {
            log::info!("merged metadata {}", relative);
        } else {
            log::info!("metadata {} already up to date", relative);
        }
        report.merged.push(relative.to_string());
    }

    Ok(report)
}

fn is_metadata(relative: &str) -> bool {
    relative.rsplit('/').next() == Some(METADATA_FILE)
}

/// merge `staged_file` into the published copy at `merged_file`
///
/// returns false when the published copy already covered the staged one.
fn merge_file(
    merged_file: &Path,
    staged_file: &Path,
    marker: &str,
    checksums: &[ChecksumAlgorithm],
) -> Result<bool> {
    let mut existing = PackageMetadata::read(merged_file)?;
    let staged = PackageMetadata::read(staged_file)?;

    let changed = existing.merge(&staged);
    existing.write(merged_file)?;

    write_sidecars(merged_file, METADATA_FILE, marker, checksums)?;

    for algorithm in ChecksumAlgorithm::ALL {
        let stale = staged_file.with_file_name(format!("{}.{}", METADATA_FILE, algorithm.extension()));
        remove_if_exists(&stale)?;
    }
    remove_if_exists(staged_file)?;

    Ok(changed)
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(Error::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}
