//! end to end staged copy of one version between two repositories

use crate::config::Config;
use crate::endpoint::{CredentialSource, RepositoryEndpoint};
use crate::error::{Error, Result};
use crate::ops::{download, merge_all, publish, scan, ArchiveBuilder, MergeReport};
use crate::transport::{ConnectorProvider, Session};
use crate::workspace::Workspace;

/// what a copy did
#[derive(Debug, Clone, Default)]
pub struct CopyReport {
    /// files fetched from the source
    pub downloaded: usize,
    /// metadata merge outcome
    pub metadata: MergeReport,
    /// entries written to the archive, including the rename script
    pub archived: usize,
    /// renames the script performed
    pub renames: usize,
}

/// copies a repository version from a source to a target
///
/// the source tree is downloaded into a local workspace, metadata is merged
/// with what the target already publishes, and the result is shipped as a
/// single archive whose version directories stay hidden behind the
/// in-process marker until the rename script activates them.
pub struct RepositoryCopier<P, C> {
    provider: P,
    credentials: C,
    config: Config,
}

impl<P: ConnectorProvider, C: CredentialSource> RepositoryCopier<P, C> {
    pub fn new(provider: P, credentials: C, config: Config) -> Self {
        Self {
            provider,
            credentials,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// copy `source` into `target` under the name `version`
    ///
    /// any failing stage aborts the copy. the target may be left with a
    /// partially unpacked archive; there is no rollback.
    pub fn copy(
        &self,
        source: &RepositoryEndpoint,
        target: &RepositoryEndpoint,
        version: &str,
    ) -> Result<CopyReport> {
        let source_connector = self.provider.connector_for(source)?;
        let mut target_connector = self.provider.connector_for(target)?;

        // nothing is staged for a target that cannot activate it
        if target_connector.command_executor().is_none() {
            return Err(Error::CommandsUnsupported(target.id.clone()));
        }

        let workspace = Workspace::prepare(
            &self.config.staging_root(),
            &self.config.workspace_prefix,
            version,
        )?;
        log::info!("staging {} in {}", version, workspace.path().display());

        let source_credentials = self.credentials.credentials(&source.id);
        let mut source_session =
            Session::open(source_connector, source, source_credentials.as_ref())?;

        log::info!("scanning {}", source);
        let paths = scan(source_session.connector(), "")?;

        log::info!("downloading {} files from {}", paths.len(), source);
        let staged = download(source_session.connector(), &workspace.path(), &paths, |p| {
            self.config.is_housekeeping(p)
        })?;
        source_session.close()?;

        let target_credentials = self.credentials.credentials(&target.id);
        let mut target_session =
            Session::open(target_connector, target, target_credentials.as_ref())?;

        log::info!("merging metadata with {}", target);
        let staged_paths: Vec<String> = staged.iter().map(|f| f.remote.clone()).collect();
        let metadata = merge_all(
            target_session.connector(),
            &workspace.path(),
            &staged_paths,
            &self.config.in_process_marker,
            &self.config.checksums,
        )?;

        log::info!("building archive {}", workspace.archive_path().display());
        let built = ArchiveBuilder::new(version, self.config.in_process_marker.as_str())
            .skip_dirs(&self.config.housekeeping)
            .build(
                &workspace.path(),
                &workspace.archive_path(),
                &workspace.script_path(),
            )?;

        log::info!("publishing {} to {}", version, target);
        publish(target_session, &built.archive, &workspace.script_name())?;

        log::info!("copied {} from {} to {}", version, source.id, target.id);

        Ok(CopyReport {
            downloaded: staged.len(),
            metadata,
            archived: built.entries.len(),
            renames: built.renames.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::NoCredentials;
    use crate::metadata::PackageMetadata;
    use crate::transport::testing::MemoryConnector;
    use crate::transport::{Connector, TransportRegistry};
    use crate::ChecksumAlgorithm;
    use std::cell::RefCell;
    use std::fs;
    use std::path::Path;
    use std::rc::Rc;
    use tempfile::tempdir;

    fn metadata(versions: &[&str], release: &str, updated: &str) -> String {
        let versions: String = versions
            .iter()
            .map(|v| format!("      <version>{}</version>\n", v))
            .collect();
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <metadata>\n  \
               <groupId>org.acme</groupId>\n  \
               <artifactId>lib</artifactId>\n  \
               <versioning>\n    \
                 <latest>{release}</latest>\n    \
                 <release>{release}</release>\n    \
                 <versions>\n{versions}    </versions>\n    \
                 <lastUpdated>{updated}</lastUpdated>\n  \
               </versioning>\n\
             </metadata>\n"
        )
    }

    fn write(root: &Path, relative: &str, content: &[u8]) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn file_url(path: &Path) -> String {
        url::Url::from_directory_path(path).unwrap().to_string()
    }

    fn config(staging: &Path) -> Config {
        Config {
            temp_dir: Some(staging.to_path_buf()),
            ..Config::default()
        }
    }

    #[test]
    fn test_copy_between_local_repositories() {
        let dir = tempdir().unwrap();
        let source_root = dir.path().join("source");
        let target_root = dir.path().join("target");
        let staging = dir.path().join("staging");

        let published = ["2.0.1", "2.0.2", "2.0.3", "2.0.4", "2.0.5"];
        for v in published {
            write(
                &target_root,
                &format!("org/acme/lib/{v}/lib-{v}.jar"),
                v.as_bytes(),
            );
        }
        write(
            &target_root,
            "org/acme/lib/maven-metadata.xml",
            metadata(&published, "2.0.5", "20260101000000").as_bytes(),
        );

        let staged_metadata = metadata(&["2.0.6"], "2.0.6", "20261019120000");
        write(&source_root, "org/acme/lib/2.0.6/lib-2.0.6.jar", b"new jar");
        write(&source_root, "org/acme/lib/2.0.6/lib-2.0.6.pom", b"<project/>");
        write(&source_root, "org/acme/lib/maven-metadata.xml", staged_metadata.as_bytes());
        write(&source_root, "org/acme/lib/maven-metadata.xml.md5", b"stale");
        write(&source_root, "org/acme/lib/.svn/entries", b"svn");

        let source = RepositoryEndpoint::parse("source", &file_url(&source_root)).unwrap();
        let target = RepositoryEndpoint::parse("target", &file_url(&target_root)).unwrap();
        let copier = RepositoryCopier::new(TransportRegistry, NoCredentials, config(&staging));

        let report = copier.copy(&source, &target, "2.0.6").unwrap();
        assert_eq!(report.downloaded, 4);
        assert_eq!(report.metadata.merged, vec!["org/acme/lib/maven-metadata.xml"]);
        assert!(report.metadata.new.is_empty());

        let lib = target_root.join("org/acme/lib");
        let merged = PackageMetadata::read(&lib.join("maven-metadata.xml")).unwrap();
        assert_eq!(
            merged.versions(),
            &["2.0.1", "2.0.2", "2.0.3", "2.0.4", "2.0.5", "2.0.6"]
        );
        let versioning = merged.versioning.as_ref().unwrap();
        assert_eq!(versioning.release.as_deref(), Some("2.0.6"));
        assert_eq!(versioning.last_updated.as_deref(), Some("20261019120000"));

        // activated version directory
        assert_eq!(fs::read(lib.join("2.0.6/lib-2.0.6.jar")).unwrap(), b"new jar");
        assert!(!lib.join("2.0.6.rip").exists());
        assert!(!lib.join(".svn").exists());
        assert_eq!(fs::read(lib.join("2.0.1/lib-2.0.1.jar")).unwrap(), b"2.0.1");

        // sidecars describe the merged document
        let bytes = fs::read(lib.join("maven-metadata.xml")).unwrap();
        for algorithm in ChecksumAlgorithm::ALL {
            let sidecar = lib.join(format!("maven-metadata.xml.{}", algorithm.extension()));
            assert_eq!(
                fs::read_to_string(sidecar).unwrap(),
                algorithm.digest_bytes(&bytes)
            );
        }
        for name in fs::read_dir(&lib).unwrap() {
            let name = name.unwrap().file_name().to_string_lossy().into_owned();
            assert!(!name.ends_with(".rip"), "leftover marked entry {name}");
        }

        // nothing left behind in the base directory
        let mut top: Vec<String> = fs::read_dir(&target_root)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        top.sort();
        assert_eq!(top, vec!["org"]);

        // staging artifacts stay for inspection
        assert!(staging.join("stagehand-2.0.6.zip").is_file());
        assert!(staging.join("stagehand-2.0.6-rename.sh").is_file());
    }

    #[test]
    fn test_copy_twice_keeps_versions() {
        let dir = tempdir().unwrap();
        let source_root = dir.path().join("source");
        let target_root = dir.path().join("target");
        let staging = dir.path().join("staging");

        write(
            &target_root,
            "org/acme/lib/maven-metadata.xml",
            metadata(&["1.0", "1.1"], "1.1", "20260101000000").as_bytes(),
        );
        write(&source_root, "org/acme/lib/1.2/lib-1.2.jar", b"jar");
        write(
            &source_root,
            "org/acme/lib/maven-metadata.xml",
            metadata(&["1.2"], "1.2", "20261019120000").as_bytes(),
        );

        let source = RepositoryEndpoint::parse("source", &file_url(&source_root)).unwrap();
        let target = RepositoryEndpoint::parse("target", &file_url(&target_root)).unwrap();
        let copier = RepositoryCopier::new(TransportRegistry, NoCredentials, config(&staging));

        copier.copy(&source, &target, "1.2").unwrap();
        let first = PackageMetadata::read(&target_root.join("org/acme/lib/maven-metadata.xml"))
            .unwrap();

        copier.copy(&source, &target, "1.2").unwrap();
        let second = PackageMetadata::read(&target_root.join("org/acme/lib/maven-metadata.xml"))
            .unwrap();

        assert_eq!(first.versions(), &["1.0", "1.1", "1.2"]);
        assert_eq!(first.versions(), second.versions());
    }

    #[test]
    fn test_copy_new_package_keeps_staged_metadata() {
        let dir = tempdir().unwrap();
        let source_root = dir.path().join("source");
        let target_root = dir.path().join("target");
        fs::create_dir_all(&target_root).unwrap();

        let staged = metadata(&["0.1"], "0.1", "20261019120000");
        write(&source_root, "org/acme/fresh/0.1/fresh-0.1.jar", b"jar");
        write(&source_root, "org/acme/fresh/maven-metadata.xml", staged.as_bytes());

        let source = RepositoryEndpoint::parse("source", &file_url(&source_root)).unwrap();
        let target = RepositoryEndpoint::parse("target", &file_url(&target_root)).unwrap();
        let copier = RepositoryCopier::new(
            TransportRegistry,
            NoCredentials,
            config(&dir.path().join("staging")),
        );

        let report = copier.copy(&source, &target, "0.1").unwrap();
        assert_eq!(report.metadata.new, vec!["org/acme/fresh/maven-metadata.xml"]);

        let fresh = target_root.join("org/acme/fresh");
        assert_eq!(
            fs::read_to_string(fresh.join("maven-metadata.xml")).unwrap(),
            staged
        );
        assert!(fresh.join("0.1/fresh-0.1.jar").is_file());
    }

    /// hands out in-memory connectors, recording which endpoints asked
    struct MemoryProvider {
        source: RefCell<Option<MemoryConnector>>,
        target: RefCell<Option<MemoryConnector>>,
    }

    impl ConnectorProvider for MemoryProvider {
        fn connector_for(&self, endpoint: &RepositoryEndpoint) -> Result<Box<dyn Connector>> {
            let slot = if endpoint.id == "source" {
                &self.source
            } else {
                &self.target
            };
            let connector = slot.borrow_mut().take().ok_or(Error::NotConnected)?;
            Ok(Box::new(connector))
        }
    }

    #[test]
    fn test_copy_rejects_target_without_commands() {
        let dir = tempdir().unwrap();
        let source = MemoryConnector::new(&[("org/acme/lib/1.0/lib-1.0.jar", b"jar")], false);
        let target = MemoryConnector::new(&[], false);
        let source_state = Rc::clone(&source.state);
        let target_state = Rc::clone(&target.state);

        let provider = MemoryProvider {
            source: RefCell::new(Some(source)),
            target: RefCell::new(Some(target)),
        };
        let copier = RepositoryCopier::new(provider, NoCredentials, config(dir.path()));

        let source_endpoint = RepositoryEndpoint::parse("source", "scp://a/srv/repo").unwrap();
        let target_endpoint = RepositoryEndpoint::parse("target", "scp://b/srv/repo").unwrap();
        let err = copier
            .copy(&source_endpoint, &target_endpoint, "1.0")
            .unwrap_err();

        assert!(matches!(err, Error::CommandsUnsupported(ref id) if id == "target"));
        assert!(!source_state.borrow().connected);
        assert_eq!(source_state.borrow().disconnects, 0);
        assert!(target_state.borrow().stored.is_empty());
        assert!(!dir.path().join("stagehand-1.0").exists());
    }

    #[test]
    fn test_copy_runs_publish_sequence() {
        let dir = tempdir().unwrap();
        let source = MemoryConnector::new(
            &[
                ("org/acme/lib/1.0/lib-1.0.jar", b"jar"),
                ("org/acme/lib/1.0/lib-1.0.pom", b"pom"),
            ],
            false,
        );
        let target = MemoryConnector::new(&[], true);
        let source_state = Rc::clone(&source.state);
        let target_state = Rc::clone(&target.state);

        let provider = MemoryProvider {
            source: RefCell::new(Some(source)),
            target: RefCell::new(Some(target)),
        };
        let copier = RepositoryCopier::new(provider, NoCredentials, config(dir.path()));

        let source_endpoint = RepositoryEndpoint::parse("source", "scp://a/srv/repo").unwrap();
        let target_endpoint = RepositoryEndpoint::parse("target", "scp://b/srv/repo").unwrap();
        let report = copier
            .copy(&source_endpoint, &target_endpoint, "1.0")
            .unwrap();

        assert_eq!(report.downloaded, 2);
        assert_eq!(report.renames, 1);
        assert_eq!(source_state.borrow().disconnects, 1);

        let target_state = target_state.borrow();
        assert_eq!(target_state.stored, vec!["stagehand-1.0.zip"]);
        assert_eq!(target_state.commands.len(), 4);
        assert_eq!(target_state.disconnects, 1);
    }
}
