#![deny(missing_docs)]

//! Thin wrappers over the platform primitives that the archiver and extractor need but that are
//! not portable: creating and resolving symbolic links, and reading or applying permission bits.
//!
//! All functions return plain [`std::io::Error`]s produced through [`fs_err`], so the messages
//! already name the path involved. Platforms that cannot create symlinks report
//! [`std::io::ErrorKind::Unsupported`].

use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};

/// Creates a symbolic link at `link` that points at `target`. The target is stored verbatim and is
/// never dereferenced, it does not need to exist.
#[cfg(unix)]
pub fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    fs_err::os::unix::fs::symlink(target, link)
}

/// Creates a symbolic link at `link` that points at `target`. The target is stored verbatim and is
/// never dereferenced, it does not need to exist.
///
/// Windows distinguishes file and directory links. A directory link is created only when the
/// target, interpreted relative to the link's parent, currently is a directory.
#[cfg(windows)]
pub fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    let resolved = match link.parent() {
        Some(parent) => parent.join(target),
        None => target.to_path_buf(),
    };
    if resolved.is_dir() {
        fs_err::os::windows::fs::symlink_dir(target, link)
    } else {
        fs_err::os::windows::fs::symlink_file(target, link)
    }
}

/// Creates a symbolic link at `link` that points at `target`.
///
/// This platform has no symlink support, so this always fails with
/// [`io::ErrorKind::Unsupported`].
#[cfg(not(any(unix, windows)))]
pub fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        format!(
            "cannot create symlink {} -> {}: symlinks are not supported on this platform",
            link.display(),
            target.display()
        ),
    ))
}

/// Like [`symlink`] but replaces a file or symlink that already exists at `link`.
pub fn replace_symlink(target: &Path, link: &Path) -> io::Result<()> {
    match symlink(target, link) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            tracing::trace!("replacing existing file at {}", link.display());
            fs_err::remove_file(link)?;
            symlink(target, link)
        }
        Err(e) => Err(e),
    }
}

/// Returns the raw target stored in the symlink at `path`.
pub fn read_link(path: &Path) -> io::Result<PathBuf> {
    fs_err::read_link(path)
}

/// Follows the symlink at `path` (and any symlinks it points through) and returns the canonical
/// path of the node it finally refers to. Fails if the chain is dangling.
pub fn resolve_symlink(path: &Path) -> io::Result<PathBuf> {
    fs_err::canonicalize(path)
}

/// Returns the permission bits (including setuid, setgid and sticky) of a node.
#[cfg(unix)]
pub fn mode(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

/// Returns the permission bits of a node. Only the read-only attribute is known on this
/// platform, it is mapped to the owner, group and other write bits.
#[cfg(not(unix))]
pub fn mode(metadata: &Metadata) -> u32 {
    let base = if metadata.is_dir() { 0o555 } else { 0o444 };
    if metadata.permissions().readonly() {
        base
    } else {
        base | 0o200
    }
}

/// Applies `mode` verbatim to the node at `path`. The process umask is not consulted.
#[cfg(unix)]
pub fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs_err::set_permissions(path, std::fs::Permissions::from_mode(mode & 0o7777))
}

/// Applies `mode` to the node at `path`. Only the owner write bit is honoured: without it the
/// node is marked read-only.
#[cfg(not(unix))]
pub fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    let mut permissions = fs_err::metadata(path)?.permissions();
    permissions.set_readonly(mode & 0o200 == 0);
    fs_err::set_permissions(path, permissions)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_symlink_is_not_dereferenced() {
        let temp_dir = tempfile::tempdir().unwrap();
        let link = temp_dir.path().join("link");

        // The target does not exist, creating the link must still succeed.
        symlink(Path::new("missing/target"), &link).unwrap();
        assert!(link.is_symlink());
        assert_eq!(read_link(&link).unwrap(), Path::new("missing/target"));

        // ...but resolving it fails.
        assert!(resolve_symlink(&link).is_err());
    }

    #[test]
    fn test_replace_symlink() {
        let temp_dir = tempfile::tempdir().unwrap();
        let link = temp_dir.path().join("link");
        std::fs::write(&link, "occupied").unwrap();

        assert_eq!(
            symlink(Path::new("a"), &link).unwrap_err().kind(),
            io::ErrorKind::AlreadyExists
        );
        replace_symlink(Path::new("a"), &link).unwrap();
        assert_eq!(read_link(&link).unwrap(), Path::new("a"));
    }

    #[test]
    fn test_resolve_symlink_chain() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = resolve_symlink(temp_dir.path()).unwrap();
        std::fs::create_dir(root.join("dir")).unwrap();
        symlink(&root.join("dir"), &root.join("first")).unwrap();
        symlink(Path::new("first"), &root.join("second")).unwrap();

        assert_eq!(resolve_symlink(&root.join("second")).unwrap(), root.join("dir"));
    }

    #[test]
    fn test_set_mode_is_verbatim() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("file");
        std::fs::write(&path, "x").unwrap();

        set_mode(&path, 0o751).unwrap();
        assert_eq!(mode(&std::fs::metadata(&path).unwrap()), 0o751);

        // File type bits are ignored.
        set_mode(&path, 0o100_640).unwrap();
        assert_eq!(mode(&std::fs::metadata(&path).unwrap()), 0o640);
    }
}
