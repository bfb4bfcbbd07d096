use std::path::{Path, PathBuf};

use crate::error::{IoResultExt, Result};

/// local staging area for one copy
///
/// everything is named `<prefix>-<version>` under a staging root, so two
/// copies of the same version at once clobber each other. nothing here is
/// removed after a successful copy.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    name: String,
}

impl Workspace {
    /// wipe and recreate the workspace directory
    pub fn prepare(root: &Path, prefix: &str, version: &str) -> Result<Self> {
        let workspace = Self {
            root: root.to_path_buf(),
            name: format!("{}-{}", prefix, version),
        };

        let path = workspace.path();
        if path.exists() {
            std::fs::remove_dir_all(&path).with_path(&path)?;
        }
        std::fs::create_dir_all(&path).with_path(&path)?;

        Ok(workspace)
    }

    /// staging root holding the workspace, archive and script
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// directory the source repository is downloaded into
    pub fn path(&self) -> PathBuf {
        self.root.join(&self.name)
    }

    /// path of the archive
    pub fn archive_path(&self) -> PathBuf {
        self.root.join(format!("{}.zip", self.name))
    }

    /// file name of the rename script
    pub fn script_name(&self) -> String {
        format!("{}-rename.sh", self.name)
    }

    /// path of the rename script
    pub fn script_path(&self) -> PathBuf {
        self.root.join(self.script_name())
    }
}
