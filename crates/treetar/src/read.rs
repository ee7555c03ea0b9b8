//! Functions that reconstruct a directory tree from a tar archive for objects that implement the
//! [`std::io::Read`] trait.

use std::collections::HashSet;
use std::io::Read;
use std::path::{Path, PathBuf};

use filetime::FileTime;
use treetar_digest::digest::{Digest, Output};
use treetar_digest::HashingReader;

use crate::node::{normalize_archive_path, EntryKind};
use crate::options::ExtractOptions;
use crate::{Error, Result};

/// Extracts every entry of the tar archive read from `reader` below `destination`, using the
/// default [`ExtractOptions`].
pub fn extract(reader: impl Read, destination: &Path) -> Result<()> {
    extract_with_options(reader, destination, &ExtractOptions::default())
}

/// Extracts every entry of the tar archive read from `reader` below `destination`.
///
/// Entries are processed in the order they appear in the archive:
///
/// - directories are created together with any missing ancestor,
/// - symlinks are created pointing at their stored target, which is not interpreted,
/// - regular files are created and filled with exactly the number of bytes their header declares,
/// - entries of any other type (pax global headers, device nodes, ...) are skipped.
///
/// Parent directories of every entry are created on demand, so an archive does not need to
/// contain explicit directory entries. Directory permissions and timestamps are applied once all
/// entries have been written, so read-only directories can still be populated.
///
/// # Errors
///
/// Extraction stops at the first error; nodes created up to that point are left in place. There is
/// no locking, extracting two archives into the same destination concurrently is not supported.
pub fn extract_with_options(
    reader: impl Read,
    destination: &Path,
    options: &ExtractOptions,
) -> Result<()> {
    fs_err::create_dir_all(destination).map_err(|err| Error::io(destination, err))?;

    let mut archive = tar::Archive::new(reader);
    let mut extractor = Extractor::new(destination, options);
    let entries = archive
        .entries()
        .map_err(|err| Error::format("the start of the archive", err))?;
    for (index, entry) in entries.enumerate() {
        let mut entry = entry.map_err(|err| Error::format(format!("entry #{index}"), err))?;
        extractor.unpack_entry(&mut entry, index)?;
    }
    extractor.finish()
}

/// Like [`extract_with_options`] but also computes the digest `D` of all bytes read from
/// `reader`.
///
/// The remainder of the stream after the end-of-archive marker is consumed as well, so the digest
/// equals the one computed by [`crate::write::write_tar_with_digest`] for the same bytes.
pub fn extract_with_digest<D: Digest + Default>(
    reader: impl Read,
    destination: &Path,
    options: &ExtractOptions,
) -> Result<Output<D>> {
    let mut reader = HashingReader::<_, D>::new(reader);
    extract_with_options(&mut reader, destination, options)?;

    std::io::copy(&mut reader, &mut std::io::sink())
        .map_err(|err| Error::format("the end of the archive", err))?;
    let (_, digest) = reader.finalize();
    Ok(digest)
}

/// Extracts the contents of a gzip compressed tar archive.
pub fn extract_tar_gz(
    reader: impl Read,
    destination: &Path,
    options: &ExtractOptions,
) -> Result<()> {
    extract_with_options(flate2::read::GzDecoder::new(reader), destination, options)
}

/// Per-archive extraction state.
struct Extractor<'a> {
    destination: &'a Path,
    options: &'a ExtractOptions,
    created_dirs: CreatedDirectories,
    deferred_dirs: Vec<DeferredDirectory>,
}

/// Metadata of an extracted directory that is applied after all entries were written.
struct DeferredDirectory {
    path: PathBuf,
    mode: u32,
    mtime: u64,
}

impl<'a> Extractor<'a> {
    fn new(destination: &'a Path, options: &'a ExtractOptions) -> Self {
        Self {
            destination,
            options,
            created_dirs: CreatedDirectories::new(destination.to_path_buf()),
            deferred_dirs: Vec::new(),
        }
    }

    fn unpack_entry<R: Read>(&mut self, entry: &mut tar::Entry<'_, R>, index: usize) -> Result<()> {
        let raw_path = entry
            .path()
            .map_err(|err| Error::format(format!("entry #{index}"), err))?
            .into_owned();
        let name = raw_path.to_string_lossy().into_owned();
        let header = entry.header();

        match EntryKind::from(header.entry_type()) {
            EntryKind::Other(flag) => {
                // The content is skipped by the tar reader when it advances to the next entry.
                if header.entry_type().is_pax_global_extensions() {
                    tracing::debug!("skipping pax global header {name}");
                } else {
                    tracing::warn!(
                        "skipping unsupported entry {name} (type flag {:?})",
                        char::from(flag)
                    );
                }
                Ok(())
            }
            EntryKind::Directory => {
                let Some(dest_path) = self.destination_path(&raw_path)? else {
                    return Ok(());
                };
                tracing::debug!("extracting directory {name}");
                self.created_dirs.create_dir_all(&dest_path)?;
                self.deferred_dirs.push(DeferredDirectory {
                    mode: header_mode(header, &name)?,
                    mtime: header_mtime(header, &name)?,
                    path: dest_path,
                });
                Ok(())
            }
            EntryKind::Symlink => {
                let Some(dest_path) = self.destination_path(&raw_path)? else {
                    return Ok(());
                };
                let target = entry
                    .link_name()
                    .map_err(|err| Error::format(&name, err))?
                    .ok_or_else(|| Error::format(&name, "symlink entry without a target"))?
                    .into_owned();
                tracing::debug!("extracting symlink {name} -> {}", target.display());
                treetar_fs::replace_symlink(&target, &dest_path).map_err(|err| {
                    if err.kind() == std::io::ErrorKind::Unsupported {
                        Error::UnsupportedOperation {
                            path: dest_path.clone(),
                            source: err,
                        }
                    } else {
                        Error::io(&dest_path, err)
                    }
                })
            }
            EntryKind::File => {
                let Some(dest_path) = self.destination_path(&raw_path)? else {
                    return Ok(());
                };
                let mode = header_mode(header, &name)?;
                let mtime = header_mtime(header, &name)?;
                let size = entry.size();
                tracing::debug!("extracting file {name} ({size} bytes)");
                self.create_file(entry, &dest_path, &name, size)?;

                if self.options.preserve_permissions {
                    treetar_fs::set_mode(&dest_path, mode)
                        .map_err(|err| Error::io(&dest_path, err))?;
                }
                if self.options.preserve_mtime {
                    set_mtime(&dest_path, mtime)?;
                }
                Ok(())
            }
        }
    }

    /// Maps an entry name to its location below the destination and makes sure the parent
    /// directory exists. Returns `None` for names that refer to the destination itself.
    fn destination_path(&mut self, raw_path: &Path) -> Result<Option<PathBuf>> {
        let Some(relative) = normalize_archive_path(raw_path)? else {
            tracing::trace!("skipping entry {}", raw_path.display());
            return Ok(None);
        };
        let dest_path = self.destination.join(relative);

        if let Some(parent) = dest_path.parent() {
            self.created_dirs.create_dir_all(parent)?;
        }
        Ok(Some(dest_path))
    }

    fn create_file(
        &self,
        content: &mut impl Read,
        dest_path: &Path,
        name: &str,
        size: u64,
    ) -> Result<()> {
        // Never write through a symlink that an earlier entry created at the same location.
        if fs_err::symlink_metadata(dest_path).is_ok_and(|metadata| metadata.file_type().is_symlink())
        {
            fs_err::remove_file(dest_path).map_err(|err| Error::io(dest_path, err))?;
        }

        let mut file = fs_err::File::create(dest_path).map_err(|err| Error::io(dest_path, err))?;
        let copied = match std::io::copy(content, &mut file) {
            Ok(copied) => copied,
            Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(Error::format(name, err))
            }
            Err(err) => return Err(Error::io(dest_path, err)),
        };

        if copied != size {
            return Err(Error::format(
                name,
                format!("the header declares {size} bytes but the archive ends after {copied}"),
            ));
        }
        Ok(())
    }

    /// Applies the deferred directory metadata, deepest directories first.
    fn finish(mut self) -> Result<()> {
        while let Some(directory) = self.deferred_dirs.pop() {
            if self.options.preserve_permissions {
                treetar_fs::set_mode(&directory.path, directory.mode)
                    .map_err(|err| Error::io(&directory.path, err))?;
            }
            if self.options.preserve_mtime {
                set_mtime(&directory.path, directory.mtime)?;
            }
        }
        Ok(())
    }
}

fn header_mode(header: &tar::Header, name: &str) -> Result<u32> {
    header.mode().map_err(|err| Error::format(name, err))
}

fn header_mtime(header: &tar::Header, name: &str) -> Result<u64> {
    header.mtime().map_err(|err| Error::format(name, err))
}

fn set_mtime(path: &Path, mtime: u64) -> Result<()> {
    // Use 1 instead of 0 for compatibility (same as tar crate)
    let mtime = mtime.max(1);
    filetime::set_file_mtime(path, FileTime::from_unix_time(mtime as i64, 0))
        .map_err(|err| Error::io(path, err))
}

/// A helper struct to memoize directory creation.
///
/// Only real directories are memoized. A symlink found where a directory is needed fails with
/// [`Error::PathTraversal`], so no entry is ever written through a link.
struct CreatedDirectories {
    created: HashSet<PathBuf>,
}

impl CreatedDirectories {
    fn new(root: PathBuf) -> Self {
        Self {
            created: HashSet::from_iter([root]),
        }
    }

    fn create_dir_all(&mut self, path: &Path) -> Result<()> {
        // Memoize directory creation to avoid redundant syscalls
        if self.created.contains(path) {
            return Ok(());
        }

        // Create the parent directories
        if let Some(parent) = path.parent() {
            self.create_dir_all(parent)?;
        }

        // Create the directory itself
        match fs_err::create_dir(path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let metadata = fs_err::symlink_metadata(path).map_err(|err| Error::io(path, err))?;
                if metadata.file_type().is_symlink() {
                    return Err(Error::PathTraversal(path.to_path_buf()));
                }
                if !metadata.is_dir() {
                    return Err(Error::io(path, e));
                }
            }
            Err(e) => return Err(Error::io(path, e)),
        }

        self.created.insert(path.to_path_buf());
        Ok(())
    }
}
