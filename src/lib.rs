//! stagehand - staged publishing of Maven repository versions
//!
//! copies one version of a repository tree from a source to a target so the
//! target never serves a half-copied version.
//!
//! # Stages
//!
//! - **scan**: walk the source through a [`transport::Connector`]
//! - **download**: fetch everything but housekeeping entries into a local
//!   workspace
//! - **merge**: merge each staged `maven-metadata.xml` with the copy the
//!   target already publishes, regenerating `.md5`/`.sha1` sidecars
//! - **archive**: zip the workspace with version directories suffixed by the
//!   in-process marker, plus a script that renames them back
//! - **publish**: upload the archive, unpack it, run the script, clean up
//!
//! # Example usage
//!
//! ```no_run
//! use stagehand::{Config, RepositoryCopier, RepositoryEndpoint};
//! use stagehand::transport::TransportRegistry;
//!
//! let config = Config::default();
//! let source = RepositoryEndpoint::parse("source", "file:///srv/staging").unwrap();
//! let target = RepositoryEndpoint::parse("target", "scp://repo.example.org/srv/maven2").unwrap();
//!
//! let copier = RepositoryCopier::new(TransportRegistry, config.clone(), config);
//! copier.copy(&source, &target, "2.0.6").unwrap();
//! ```

mod checksum;
mod config;
mod copier;
mod endpoint;
mod error;
mod metadata;
mod workspace;

pub mod ops;
pub mod transport;

pub use checksum::{write_sidecars, ChecksumAlgorithm};
pub use config::{Config, Server, DEFAULT_MARKER, DEFAULT_PREFIX};
pub use copier::{CopyReport, RepositoryCopier};
pub use endpoint::{CredentialSource, Credentials, NoCredentials, RepositoryEndpoint};
pub use error::{Error, IoResultExt, Result};
pub use metadata::{PackageMetadata, Plugin, Plugins, Snapshot, Versioning, Versions, METADATA_FILE};
pub use workspace::Workspace;
