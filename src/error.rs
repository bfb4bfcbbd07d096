use std::path::PathBuf;

/// error type for stagehand operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("transport error: {message}")]
    Transport { message: String },

    #[error("unsupported protocol '{protocol}' for repository {id}")]
    UnsupportedProtocol { id: String, protocol: String },

    #[error("invalid repository url {url}: {message}")]
    InvalidEndpoint { url: String, message: String },

    #[error("transport for repository {0} cannot execute remote commands")]
    CommandsUnsupported(String),

    #[error("remote command `{command}` exited with status {status}")]
    RemoteCommand { command: String, status: i32 },

    #[error("connector used before connect")]
    NotConnected,

    #[error("metadata file is corrupt {path}: {message}")]
    CorruptMetadata { path: PathBuf, message: String },

    #[error("failed to serialize metadata {path}: {message}")]
    MetadataWrite { path: PathBuf, message: String },

    #[error("unsupported checksum algorithm: {0}")]
    UnsupportedChecksum(String),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("config serialization error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// true when the error means the remote resource does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// helper to wrap io errors with path context
pub trait IoResultExt<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|source| Error::Io {
            path: path.into(),
            source,
        })
    }
}
