//! packages the staging workspace for an atomic unpack on the target
//!
//! version directories are written into the archive with the in-process
//! marker appended, so nothing resolves them while the archive is being
//! unpacked. the rename script shipped as the last entry strips the marker
//! again once every file is in place.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{Error, IoResultExt, Result};

/// a directory or file rename that activates staged content
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenameOperation {
    pub from: String,
    pub to: String,
}

impl RenameOperation {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    fn depth(&self) -> usize {
        self.to.matches('/').count()
    }

    /// the `mv` line for the rename script
    pub fn command(&self) -> Result<String> {
        Ok(format!("mv {} {}", quote(&self.from)?, quote(&self.to)?))
    }
}

// parents sort before anything beneath them
impl Ord for RenameOperation {
    fn cmp(&self, other: &Self) -> Ordering {
        self.depth()
            .cmp(&other.depth())
            .then_with(|| self.from.cmp(&other.from))
            .then_with(|| self.to.cmp(&other.to))
    }
}

impl PartialOrd for RenameOperation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// what [`ArchiveBuilder::build`] produced
#[derive(Debug, Clone)]
pub struct BuiltArchive {
    pub archive: PathBuf,
    pub script: PathBuf,
    /// archive entry names, in write order
    pub entries: Vec<String>,
    /// renames written to the script, in script order
    pub renames: Vec<RenameOperation>,
}

/// builds the staging archive and its rename script
#[derive(Debug, Clone)]
pub struct ArchiveBuilder {
    version: String,
    marker: String,
    skip_dirs: Vec<String>,
}

impl ArchiveBuilder {
    pub fn new(version: impl Into<String>, marker: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            marker: marker.into(),
            skip_dirs: Vec::new(),
        }
    }

    /// directory names that are left out of the archive
    pub fn skip_dirs(mut self, names: &[String]) -> Self {
        self.skip_dirs = names.to_vec();
        self
    }

    /// archive name for a workspace-relative path, and the renames it needs
    ///
    /// every directory component equal to the version gets the marker. a
    /// component already carrying the marker keeps it and is renamed too.
    /// `from` is expressed with earlier components already renamed, matching
    /// the parent-first order the script runs in.
    pub fn rewrite(&self, relative: &str, is_dir: bool) -> (String, Vec<RenameOperation>) {
        let segments: Vec<&str> = relative.split('/').filter(|s| !s.is_empty()).collect();
        let last = segments.len().saturating_sub(1);

        let mut marked: Vec<String> = Vec::with_capacity(segments.len());
        let mut plain: Vec<String> = Vec::with_capacity(segments.len());
        let mut renames = Vec::new();

        for (i, segment) in segments.iter().enumerate() {
            let is_dir_segment = is_dir || i < last;

            let (archived, activated) = if is_dir_segment && *segment == self.version {
                (format!("{}{}", segment, self.marker), segment.to_string())
            } else if let Some(stripped) = self.strip_marker(segment) {
                (segment.to_string(), stripped.to_string())
            } else {
                (segment.to_string(), segment.to_string())
            };

            if archived != activated {
                let prefix = plain.join("/");
                let join = |name: &str| {
                    if prefix.is_empty() {
                        name.to_string()
                    } else {
                        format!("{}/{}", prefix, name)
                    }
                };
                renames.push(RenameOperation::new(join(&archived), join(&activated)));
            }

            marked.push(archived);
            plain.push(activated);
        }

        (marked.join("/"), renames)
    }

    fn strip_marker<'s>(&self, segment: &'s str) -> Option<&'s str> {
        segment
            .strip_suffix(self.marker.as_str())
            .filter(|rest| !rest.is_empty())
    }

    /// zip `workspace` into `archive_path`, writing the rename script to
    /// `script_path` and appending it as the final entry
    pub fn build(&self, workspace: &Path, archive_path: &Path, script_path: &Path) -> Result<BuiltArchive> {
        let file = File::create(archive_path).with_path(archive_path)?;
        let mut zip = ZipWriter::new(file);
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644);
        let dir_options = SimpleFileOptions::default().unix_permissions(0o755);

        let mut entries = Vec::new();
        let mut renames = BTreeSet::new();

        let walker = WalkDir::new(workspace)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !(e.file_type().is_dir() && self.is_skipped(e.file_name())));

        for entry in walker {
            let entry = entry.map_err(|e| walk_error(workspace, e))?;
            let relative = relative_name(workspace, entry.path());

            if entry.file_type().is_dir() {
                if entry.file_name().to_string_lossy() == self.version.as_str() {
                    let (name, ops) = self.rewrite(&relative, true);
                    zip.add_directory(name.as_str(), dir_options)?;
                    entries.push(format!("{}/", name));
                    renames.extend(ops);
                }
                continue;
            }

            if !entry.file_type().is_file() {
                continue;
            }

            let (name, ops) = self.rewrite(&relative, false);
            log::debug!("archiving {} as {}", relative, name);

            zip.start_file(name.as_str(), options)?;
            let mut source = File::open(entry.path()).with_path(entry.path())?;
            io::copy(&mut source, &mut zip).with_path(entry.path())?;

            entries.push(name);
            renames.extend(ops);
        }

        let renames: Vec<RenameOperation> = renames.into_iter().collect();
        write_script(script_path, &renames)?;

        let script_name = script_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::Io {
                path: script_path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "script path has no file name"),
            })?;

        zip.start_file(script_name.as_str(), options)?;
        let mut script = File::open(script_path).with_path(script_path)?;
        io::copy(&mut script, &mut zip).with_path(script_path)?;
        entries.push(script_name);

        zip.finish()?;

        Ok(BuiltArchive {
            archive: archive_path.to_path_buf(),
            script: script_path.to_path_buf(),
            entries,
            renames,
        })
    }

    fn is_skipped(&self, name: &std::ffi::OsStr) -> bool {
        let name = name.to_string_lossy();
        self.skip_dirs.iter().any(|s| *s == name)
    }
}

/// one `mv` per line, always `\n` terminated
fn write_script(path: &Path, renames: &[RenameOperation]) -> Result<()> {
    let mut script = String::new();
    for op in renames {
        script.push_str(&op.command()?);
        script.push('\n');
    }
    fs::write(path, script).with_path(path)
}

/// workspace-relative name with `/` separators
fn relative_name(workspace: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(workspace).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn walk_error(root: &Path, e: walkdir::Error) -> Error {
    let path = e.path().unwrap_or(root).to_path_buf();
    Error::Io {
        path,
        source: e
            .into_io_error()
            .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "walkdir error")),
    }
}

fn quote(s: &str) -> Result<String> {
    shlex::try_quote(s)
        .map(|q| q.into_owned())
        .map_err(|e| Error::Transport {
            message: format!("cannot quote {:?} for the rename script: {}", s, e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::tempdir;

    const VERSION: &str = "2.0.6";

    fn builder() -> ArchiveBuilder {
        ArchiveBuilder::new(VERSION, ".rip").skip_dirs(&[".svn".to_string()])
    }

    fn touch(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_rewrite_version_directory() {
        let (name, ops) = builder().rewrite("org/acme/lib/2.0.6/lib-2.0.6.jar", false);
        assert_eq!(name, "org/acme/lib/2.0.6.rip/lib-2.0.6.jar");
        assert_eq!(
            ops,
            vec![RenameOperation::new("org/acme/lib/2.0.6.rip", "org/acme/lib/2.0.6")]
        );
    }

    #[test]
    fn test_rewrite_leaves_other_paths() {
        let (name, ops) = builder().rewrite("org/acme/lib/2.0.5/lib-2.0.5.jar", false);
        assert_eq!(name, "org/acme/lib/2.0.5/lib-2.0.5.jar");
        assert!(ops.is_empty());

        // a file named like the version is not a version directory
        let (name, ops) = builder().rewrite("org/acme/2.0.6", false);
        assert_eq!(name, "org/acme/2.0.6");
        assert!(ops.is_empty());

        // suffix match is not enough
        let (name, _) = builder().rewrite("org/acme/lib-2.0.6/file", false);
        assert_eq!(name, "org/acme/lib-2.0.6/file");
    }

    #[test]
    fn test_rewrite_marked_metadata() {
        let (name, ops) = builder().rewrite("org/acme/lib/maven-metadata.xml.rip", false);
        assert_eq!(name, "org/acme/lib/maven-metadata.xml.rip");
        assert_eq!(
            ops,
            vec![RenameOperation::new(
                "org/acme/lib/maven-metadata.xml.rip",
                "org/acme/lib/maven-metadata.xml"
            )]
        );
    }

    #[test]
    fn test_rewrite_marked_file_inside_version_directory() {
        let (name, ops) = builder().rewrite("lib/2.0.6/maven-metadata.xml.sha1.rip", false);
        assert_eq!(name, "lib/2.0.6.rip/maven-metadata.xml.sha1.rip");
        assert_eq!(
            ops,
            vec![
                RenameOperation::new("lib/2.0.6.rip", "lib/2.0.6"),
                RenameOperation::new(
                    "lib/2.0.6/maven-metadata.xml.sha1.rip",
                    "lib/2.0.6/maven-metadata.xml.sha1"
                ),
            ]
        );
    }

    #[test]
    fn test_rewrite_top_level_version_directory() {
        let (name, ops) = builder().rewrite("2.0.6/readme.txt", false);
        assert_eq!(name, "2.0.6.rip/readme.txt");
        assert_eq!(ops, vec![RenameOperation::new("2.0.6.rip", "2.0.6")]);
    }

    #[test]
    fn test_rename_order_parents_first() {
        let mut set = BTreeSet::new();
        set.insert(RenameOperation::new("a/2.0.6/b/2.0.6.rip", "a/2.0.6/b/2.0.6"));
        set.insert(RenameOperation::new("z/2.0.6.rip", "z/2.0.6"));
        set.insert(RenameOperation::new("a/2.0.6.rip", "a/2.0.6"));
        set.insert(RenameOperation::new("a/2.0.6.rip", "a/2.0.6"));

        let ordered: Vec<_> = set.into_iter().map(|op| op.from).collect();
        assert_eq!(ordered, vec!["a/2.0.6.rip", "z/2.0.6.rip", "a/2.0.6/b/2.0.6.rip"]);
    }

    #[test]
    fn test_build_archive_and_script() {
        let dir = tempdir().unwrap();
        let ws = dir.path().join("workspace");
        touch(&ws, "org/acme/lib/2.0.6/lib-2.0.6.jar", "jar");
        touch(&ws, "org/acme/lib/2.0.6/lib-2.0.6.pom", "pom");
        touch(&ws, "org/acme/lib/2.0.5/lib-2.0.5.jar", "old");
        touch(&ws, "org/acme/lib/maven-metadata.xml.rip", "<metadata/>");
        touch(&ws, "org/acme/lib/.svn/entries", "svn");
        fs::create_dir_all(ws.join("org/acme/empty/2.0.6")).unwrap();

        let archive_path = dir.path().join("stagehand-2.0.6.zip");
        let script_path = dir.path().join("stagehand-2.0.6-rename.sh");
        let built = builder().build(&ws, &archive_path, &script_path).unwrap();

        let script = fs::read_to_string(&script_path).unwrap();
        assert_eq!(
            script,
            "mv org/acme/empty/2.0.6.rip org/acme/empty/2.0.6\n\
             mv org/acme/lib/2.0.6.rip org/acme/lib/2.0.6\n\
             mv org/acme/lib/maven-metadata.xml.rip org/acme/lib/maven-metadata.xml\n"
        );
        assert_eq!(built.renames.len(), 3);

        let mut zip = zip::ZipArchive::new(File::open(&archive_path).unwrap()).unwrap();
        let names: Vec<String> = zip.file_names().map(|n| n.to_string()).collect();
        assert!(names.contains(&"org/acme/lib/2.0.6.rip/lib-2.0.6.jar".to_string()));
        assert!(names.contains(&"org/acme/lib/2.0.6.rip/lib-2.0.6.pom".to_string()));
        assert!(names.contains(&"org/acme/lib/2.0.5/lib-2.0.5.jar".to_string()));
        assert!(names.contains(&"org/acme/lib/maven-metadata.xml.rip".to_string()));
        assert!(names.iter().all(|n| !n.contains(".svn")));
        assert!(names.iter().all(|n| !n.contains("/2.0.6/")));

        // the script is the last entry
        assert_eq!(built.entries.last().unwrap(), "stagehand-2.0.6-rename.sh");
        let last = zip.len() - 1;
        let mut entry = zip.by_index(last).unwrap();
        assert_eq!(entry.name(), "stagehand-2.0.6-rename.sh");
        let mut content = String::new();
        entry.read_to_string(&mut content).unwrap();
        assert_eq!(content, script);
    }

    #[test]
    fn test_every_version_segment_marked_once() {
        let b = builder();
        for original in [
            "a/2.0.6/x.jar",
            "a/b/2.0.6/c/d.pom",
            "deep/er/2.0.6/2.0.6.txt",
        ] {
            let (name, ops) = b.rewrite(original, false);
            assert_eq!(name.matches("/2.0.6.rip/").count(), 1, "{}", name);
            let op = &ops[0];
            assert!(original.starts_with(&format!("{}/", op.to)));
            assert_eq!(op.from, format!("{}.rip", op.to));
        }
    }
}
