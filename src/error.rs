use std::io;
use std::path::PathBuf;

use crate::yarn_lock::SyntaxError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not parse {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: SyntaxError,
    },
    /// A top-level key that does not have the `package@requirement` shape.
    #[error("malformed lockfile key `{key}` (expected `<package>@<requirement>`)")]
    MalformedKey { key: String },
    #[error("lockfile entry `{key}` is not a block")]
    NotABlock { key: String },
    #[error("invalid version `{version}` for package {package}")]
    InvalidVersion {
        package: String,
        version: String,
        #[source]
        source: semver::Error,
    },
}

impl Error {
    pub(crate) fn read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }
}
