use std::fmt;
use std::fs::File;
use std::io;
use std::path::Path;
use std::str::FromStr;

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::error::{Error, IoResultExt, Result};

/// digest families written as metadata sidecars
///
/// named in config by their sidecar extension (`md5`, `sha1`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ChecksumAlgorithm {
    Md5,
    Sha1,
}

impl ChecksumAlgorithm {
    /// every sidecar family, in the order they are written
    pub const ALL: [ChecksumAlgorithm; 2] = [ChecksumAlgorithm::Md5, ChecksumAlgorithm::Sha1];

    /// sidecar file extension, without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            ChecksumAlgorithm::Md5 => "md5",
            ChecksumAlgorithm::Sha1 => "sha1",
        }
    }

    /// lowercase hex digest of `data`
    pub fn digest_bytes(&self, data: &[u8]) -> String {
        match self {
            ChecksumAlgorithm::Md5 => hex::encode(Md5::digest(data)),
            ChecksumAlgorithm::Sha1 => hex::encode(Sha1::digest(data)),
        }
    }

    /// lowercase hex digest of a file, streamed
    pub fn digest_file(&self, path: &Path) -> Result<String> {
        let mut file = File::open(path).with_path(path)?;
        let digest = match self {
            ChecksumAlgorithm::Md5 => {
                let mut hasher = Md5::new();
                io::copy(&mut file, &mut hasher).with_path(path)?;
                hex::encode(hasher.finalize())
            }
            ChecksumAlgorithm::Sha1 => {
                let mut hasher = Sha1::new();
                io::copy(&mut file, &mut hasher).with_path(path)?;
                hex::encode(hasher.finalize())
            }
        };
        Ok(digest)
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChecksumAlgorithm::Md5 => write!(f, "md5"),
            ChecksumAlgorithm::Sha1 => write!(f, "sha1"),
        }
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "md5" => Ok(ChecksumAlgorithm::Md5),
            "sha1" => Ok(ChecksumAlgorithm::Sha1),
            _ => Err(Error::UnsupportedChecksum(s.to_string())),
        }
    }
}

impl TryFrom<String> for ChecksumAlgorithm {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<ChecksumAlgorithm> for String {
    fn from(algorithm: ChecksumAlgorithm) -> Self {
        algorithm.to_string()
    }
}

/// write `<name>.<ext><suffix>` sidecars next to `document`, one per family
///
/// the sidecar holds the bare digest of `document`, no file name and no newline.
pub fn write_sidecars(
    document: &Path,
    name: &str,
    suffix: &str,
    algorithms: &[ChecksumAlgorithm],
) -> Result<()> {
    for algorithm in algorithms {
        let digest = algorithm.digest_file(document)?;
        let sidecar =
            document.with_file_name(format!("{}.{}{}", name, algorithm.extension(), suffix));
        std::fs::write(&sidecar, digest).with_path(&sidecar)?;
        log::debug!("wrote {} checksum {}", algorithm, sidecar.display());
    }

    Ok(())
}
