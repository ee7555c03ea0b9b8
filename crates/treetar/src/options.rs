//! Configuration for writing and extracting archives.
//!
//! Everything the archiver or extractor needs to know is passed in explicitly through these
//! structs; there is no process wide state.

use std::path::PathBuf;

use crate::Error;

/// How the target of a symlink is recorded in its archive entry.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum SymlinkTargets {
    /// Follow the link (and any links it points through) and store the canonical path of the node
    /// it finally refers to. Dangling links cannot be archived in this mode.
    #[default]
    Resolved,
    /// Store the raw value of the link as returned by `readlink`.
    Verbatim,
}

/// Which metadata is copied from the filesystem into the entry headers.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum MetadataMode {
    /// Permission bits, modification time and ownership are copied as they are.
    #[default]
    Complete,
    /// Ownership and timestamps are zeroed out and permissions are reduced to either `0o644` or
    /// `0o755`, so that the same tree always produces the same archive.
    Deterministic,
}

impl From<MetadataMode> for tar::HeaderMode {
    fn from(mode: MetadataMode) -> Self {
        match mode {
            MetadataMode::Complete => tar::HeaderMode::Complete,
            MetadataMode::Deterministic => tar::HeaderMode::Deterministic,
        }
    }
}

/// Options that control how a set of paths is written to an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default, rename_all = "kebab-case")
)]
pub struct ArchiveOptions {
    /// Removed from the beginning of every path before it is stored, much like the `-C` option of
    /// GNU tar. The prefix is matched on whole path components, so `work` and `work/` are
    /// equivalent and neither matches `workshop/file`.
    pub strip_prefix: Option<PathBuf>,

    /// Visit the children of a directory sorted by file name. When disabled, the order in which
    /// the operating system lists them is used, which is not guaranteed to be stable.
    pub sort_entries: bool,

    /// How symlink targets are recorded.
    pub symlinks: SymlinkTargets,

    /// Which metadata is copied into the headers.
    pub metadata: MetadataMode,

    /// When set, every entry uses this modification time instead of the one on disk.
    pub timestamp: Option<chrono::DateTime<chrono::Utc>>,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            strip_prefix: None,
            sort_entries: true,
            symlinks: SymlinkTargets::default(),
            metadata: MetadataMode::default(),
            timestamp: None,
        }
    }
}

impl ArchiveOptions {
    /// Sets the prefix that is stripped from every entry name.
    pub fn with_strip_prefix(self, strip_prefix: impl Into<PathBuf>) -> Self {
        Self {
            strip_prefix: Some(strip_prefix.into()),
            ..self
        }
    }

    /// Enables or disables sorting of directory children.
    pub fn with_sorted_entries(self, sort_entries: bool) -> Self {
        Self {
            sort_entries,
            ..self
        }
    }

    /// Sets how symlink targets are recorded.
    pub fn with_symlink_targets(self, symlinks: SymlinkTargets) -> Self {
        Self { symlinks, ..self }
    }

    /// Sets which metadata is copied into the headers.
    pub fn with_metadata_mode(self, metadata: MetadataMode) -> Self {
        Self { metadata, ..self }
    }

    /// Uses `timestamp` as the modification time of every entry.
    pub fn with_timestamp(self, timestamp: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            timestamp: Some(timestamp),
            ..self
        }
    }
}

/// Options that control how an archive is reconstructed on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default, rename_all = "kebab-case")
)]
pub struct ExtractOptions {
    /// Apply the permission bits stored in the headers to extracted files and directories. The
    /// bits are applied verbatim after creation, the process umask does not mask them.
    pub preserve_permissions: bool,

    /// Apply the modification time stored in the headers to extracted files and directories.
    pub preserve_mtime: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            preserve_permissions: true,
            preserve_mtime: false,
        }
    }
}

impl ExtractOptions {
    /// Enables or disables applying the stored permission bits.
    pub fn with_permissions(self, preserve_permissions: bool) -> Self {
        Self {
            preserve_permissions,
            ..self
        }
    }

    /// Enables or disables applying the stored modification times.
    pub fn with_mtime(self, preserve_mtime: bool) -> Self {
        Self {
            preserve_mtime,
            ..self
        }
    }
}

/// Select the compression level used when an archive is wrapped in gzip.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum CompressionLevel {
    /// Use the lowest compression level (1)
    Lowest,
    /// Use the highest compression level (9)
    Highest,
    /// Use the default compression level (6)
    #[default]
    Default,
    /// Use a numeric compression level (0-9, where 0 stores the data uncompressed)
    Numeric(u32),
}

impl CompressionLevel {
    pub(crate) fn to_gzip_level(self) -> Result<flate2::Compression, Error> {
        match self {
            CompressionLevel::Lowest => Ok(flate2::Compression::fast()),
            CompressionLevel::Highest => Ok(flate2::Compression::best()),
            CompressionLevel::Default => Ok(flate2::Compression::default()),
            CompressionLevel::Numeric(n) => {
                if n > 9 {
                    Err(Error::InvalidCompressionLevel(n))
                } else {
                    Ok(flate2::Compression::new(n))
                }
            }
        }
    }
}
