use std::path::{Path, PathBuf};

/// An error that can occur while writing, extracting or searching an archive.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A filesystem operation on a source or destination node failed.
    #[error("i/o error on {}", path.display())]
    Io {
        /// The file or directory the operation was performed on.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Writing the end of the archive (or the compression trailer) to the sink failed.
    #[error("failed to finish writing the archive")]
    Sink(#[source] std::io::Error),

    /// The archive stream is malformed: a truncated header, or content that does not match the
    /// size declared by its header.
    #[error("malformed archive at {entry}: {reason}")]
    Format {
        /// The entry name, or its position when the name could not be read.
        entry: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The platform cannot create symbolic links.
    #[error("cannot create symlink {}", path.display())]
    UnsupportedOperation {
        /// The path the symlink should have been created at.
        path: PathBuf,
        /// The error reported by the platform.
        #[source]
        source: std::io::Error,
    },

    /// A source node cannot be represented as an archive entry.
    #[error("cannot create an archive entry for {}: {reason}", path.display())]
    Encoding {
        /// The source path.
        path: PathBuf,
        /// Why it cannot be encoded.
        reason: String,
    },

    /// An entry name would place a node outside of the destination directory.
    #[error("path traversal attempt in archive: {}", .0.display())]
    PathTraversal(PathBuf),

    /// No entry with the requested name exists in the archive.
    #[error("{0} not found")]
    NotFound(String),

    /// The requested entry name is not a relative path.
    #[error("filename must be relative, got {0:?}")]
    InvalidName(String),

    /// The requested compression level is outside of the range the codec supports.
    #[error("gzip compression level must be between 0 and 9, got {0}")]
    InvalidCompressionLevel(u32),
}

impl Error {
    pub(crate) fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub(crate) fn format(entry: impl Into<String>, reason: impl ToString) -> Self {
        Error::Format {
            entry: entry.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn encoding(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Error::Encoding {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// A result whose error defaults to [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;
