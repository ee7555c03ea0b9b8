//! Classification of filesystem nodes and archive entries, and the mapping between filesystem
//! paths and entry names.

use std::fs::FileType;
use std::path::{Component, Path, PathBuf};

use crate::{Error, Result};

/// The kinds of filesystem node that can be archived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A directory, archived as a header followed by its children.
    Directory,
    /// A regular file, archived as a header followed by its content.
    File,
    /// A symbolic link, archived as a header carrying the link target.
    Symlink,
}

impl NodeKind {
    /// Classifies a node from its (non-followed) file type. Returns `None` for node kinds that have
    /// no archive representation, like FIFOs, sockets and device nodes.
    pub fn from_file_type(file_type: FileType) -> Option<Self> {
        if file_type.is_symlink() {
            Some(NodeKind::Symlink)
        } else if file_type.is_dir() {
            Some(NodeKind::Directory)
        } else if file_type.is_file() {
            Some(NodeKind::File)
        } else {
            None
        }
    }

    /// The type flag written to the header of an entry of this kind.
    pub fn entry_type(self) -> tar::EntryType {
        match self {
            NodeKind::Directory => tar::EntryType::Directory,
            NodeKind::File => tar::EntryType::Regular,
            NodeKind::Symlink => tar::EntryType::Symlink,
        }
    }
}

/// The kinds of archive entry the extractor distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A directory entry.
    Directory,
    /// A regular file entry.
    File,
    /// A symbolic link entry.
    Symlink,
    /// Any other type flag, e.g. a pax global header or a device node. The raw flag is kept for
    /// diagnostics.
    Other(u8),
}

impl From<tar::EntryType> for EntryKind {
    fn from(entry_type: tar::EntryType) -> Self {
        if entry_type.is_dir() {
            EntryKind::Directory
        } else if entry_type.is_symlink() {
            EntryKind::Symlink
        } else if entry_type.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other(entry_type.as_byte())
        }
    }
}

/// Computes the entry name of `path`: `strip_prefix` is removed if `path` starts with it (on whole
/// components) and the remaining components are joined with `/`.
///
/// Returns `Ok(None)` if nothing remains after stripping, e.g. when `path` is the prefix itself.
/// Names that would be absolute, contain `..`, or are not valid unicode cannot be encoded.
pub(crate) fn entry_name(path: &Path, strip_prefix: Option<&Path>) -> Result<Option<String>> {
    let relative = strip_prefix
        .and_then(|prefix| path.strip_prefix(prefix).ok())
        .unwrap_or(path);

    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::CurDir => {}
            Component::Normal(part) => {
                let part = part
                    .to_str()
                    .ok_or_else(|| Error::encoding(path, "the path is not valid unicode"))?;
                parts.push(part);
            }
            Component::ParentDir => {
                return Err(Error::encoding(
                    path,
                    "entry names must not contain `..` components",
                ));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(Error::encoding(
                    path,
                    "entry names must be relative, use a strip prefix to remove the leading part",
                ));
            }
        }
    }

    if parts.is_empty() {
        return Ok(None);
    }
    Ok(Some(parts.join("/")))
}

/// Normalizes a path from a tar archive by stripping leading components
/// that are not meaningful for extraction (Prefix, `RootDir`, `CurDir`).
///
/// Returns:
/// - `Ok(Some(path))` - normalized path to extract
/// - `Ok(None)` - path normalizes to nothing (e.g., "." or "/"), should be
///   skipped
/// - `Err(PathTraversal)` - path contains ".." traversal
pub(crate) fn normalize_archive_path(path: &Path) -> Result<Option<PathBuf>> {
    let mut result = PathBuf::with_capacity(path.as_os_str().len());

    for component in path.components() {
        match component {
            Component::Prefix(..) | Component::RootDir | Component::CurDir => {}
            // Any `..` could place the node outside of the destination.
            Component::ParentDir => return Err(Error::PathTraversal(path.to_path_buf())),
            Component::Normal(part) => result.push(part),
        }
    }

    if result.as_os_str().is_empty() {
        return Ok(None);
    }

    Ok(Some(result))
}
