//! Functionality for writing directory trees to tar archives.
use std::fs::Metadata;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use treetar_digest::digest::{Digest, Output};
use treetar_digest::HashingWriter;

use crate::node::{entry_name, NodeKind};
use crate::options::{ArchiveOptions, CompressionLevel, MetadataMode, SymlinkTargets};
use crate::{Error, Result};

/// Streams filesystem nodes into a tar archive.
///
/// Every path passed to [`Archiver::append_path`] is visited depth-first: directories produce an
/// entry for themselves followed by entries for all of their children, regular files produce an
/// entry followed by their content and symlinks produce an entry carrying their target. The
/// archive is written in a single linear pass, nothing is buffered beyond what the underlying
/// writer does.
///
/// Call [`Archiver::finish`] to write the end-of-archive marker and get the writer back. If the
/// archiver is dropped instead, the marker is still written but errors are lost.
pub struct Archiver<W: Write> {
    builder: tar::Builder<W>,
    options: ArchiveOptions,
}

impl<W: Write> Archiver<W> {
    /// Creates an archiver that writes to `writer`.
    pub fn new(writer: W, options: ArchiveOptions) -> Self {
        let mut builder = tar::Builder::new(writer);
        builder.mode(options.metadata.into());
        builder.follow_symlinks(false);
        Self { builder, options }
    }

    /// The options this archiver was created with.
    pub fn options(&self) -> &ArchiveOptions {
        &self.options
    }

    /// Appends `path` and, if it is a directory, everything below it.
    ///
    /// If an error is returned the archive written so far is truncated and should be discarded.
    pub fn append_path(&mut self, path: &Path) -> Result<()> {
        let metadata = fs_err::symlink_metadata(path).map_err(|err| Error::io(path, err))?;
        let kind = NodeKind::from_file_type(metadata.file_type()).ok_or_else(|| {
            Error::encoding(
                path,
                format!("unsupported file type {:?}", metadata.file_type()),
            )
        })?;
        let name = entry_name(path, self.options.strip_prefix.as_deref())?;

        match kind {
            NodeKind::Directory => {
                match &name {
                    Some(name) => self.append_directory(path, name, &metadata)?,
                    None => tracing::trace!(
                        "not creating an entry for {}, it is the strip prefix itself",
                        path.display()
                    ),
                }
                for child in self.read_dir(path)? {
                    self.append_path(&child)?;
                }
            }
            NodeKind::File => {
                let name = name.ok_or_else(|| empty_name_error(path))?;
                self.append_file(path, &name, &metadata)?;
            }
            NodeKind::Symlink => {
                let name = name.ok_or_else(|| empty_name_error(path))?;
                self.append_symlink(path, &name, &metadata)?;
            }
        }

        Ok(())
    }

    /// Writes the end-of-archive marker and returns the underlying writer.
    pub fn finish(self) -> Result<W> {
        self.builder.into_inner().map_err(Error::Sink)
    }

    fn append_directory(&mut self, path: &Path, name: &str, metadata: &Metadata) -> Result<()> {
        tracing::debug!("adding directory {name}");
        let mut header = self.prepare_header(NodeKind::Directory, metadata);
        self.builder
            .append_data(&mut header, name, std::io::empty())
            .map_err(|err| Error::io(path, err))
    }

    fn append_file(&mut self, path: &Path, name: &str, metadata: &Metadata) -> Result<()> {
        tracing::debug!("adding file {name} ({} bytes)", metadata.len());
        let mut header = self.prepare_header(NodeKind::File, metadata);
        let file = fs_err::File::open(path).map_err(|err| Error::io(path, err))?;

        // The header already declares the size, never copy more than that.
        let mut content = file.take(metadata.len());
        self.builder
            .append_data(&mut header, name, &mut content)
            .map_err(|err| Error::io(path, err))?;

        if content.limit() != 0 {
            return Err(Error::encoding(
                path,
                format!(
                    "the file shrank while it was archived ({} of {} bytes written)",
                    metadata.len() - content.limit(),
                    metadata.len()
                ),
            ));
        }
        Ok(())
    }

    fn append_symlink(&mut self, path: &Path, name: &str, metadata: &Metadata) -> Result<()> {
        let target = match self.options.symlinks {
            SymlinkTargets::Resolved => treetar_fs::resolve_symlink(path),
            SymlinkTargets::Verbatim => treetar_fs::read_link(path),
        }
        .map_err(|err| Error::io(path, err))?;

        tracing::debug!("adding symlink {name} -> {}", target.display());
        let mut header = self.prepare_header(NodeKind::Symlink, metadata);
        self.builder
            .append_link(&mut header, name, &target)
            .map_err(|err| Error::io(path, err))
    }

    fn prepare_header(&self, kind: NodeKind, metadata: &Metadata) -> tar::Header {
        let mut header = tar::Header::new_gnu();
        header.set_metadata_in_mode(metadata, self.options.metadata.into());

        // Store the permission bits only, never the file type bits of `st_mode`.
        if self.options.metadata == MetadataMode::Complete {
            header.set_mode(treetar_fs::mode(metadata));
        }
        header.set_entry_type(kind.entry_type());
        header.set_size(match kind {
            NodeKind::File => metadata.len(),
            NodeKind::Directory | NodeKind::Symlink => 0,
        });

        if let Some(timestamp) = &self.options.timestamp {
            // Headers cannot represent times before the epoch.
            header.set_mtime(u64::try_from(timestamp.timestamp()).unwrap_or(0));
        }

        header
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut children = fs_err::read_dir(path)
            .and_then(|entries| {
                entries
                    .map(|entry| entry.map(|entry| entry.path()))
                    .collect::<std::io::Result<Vec<_>>>()
            })
            .map_err(|err| Error::io(path, err))?;

        if self.options.sort_entries {
            children.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        }
        Ok(children)
    }
}

fn empty_name_error(path: &Path) -> Error {
    Error::encoding(
        path,
        "the entry name is empty after removing the strip prefix",
    )
}

/// Write the given paths (and everything below them) to a tar archive.
///
/// The paths are written in the order they are given. Returns the writer once the end-of-archive
/// marker has been written.
///
/// # Errors
///
/// Fails if a path cannot be read, cannot be represented in an archive, or if the writer returns
/// an error. The writer then holds a truncated archive that should be discarded.
///
/// # Examples
///
/// ```no_run
/// use std::fs::File;
/// use treetar::{write::write_tar, ArchiveOptions};
///
/// let file = File::create("work.tar").unwrap();
/// let options = ArchiveOptions::default().with_strip_prefix("work/");
/// write_tar(file, &["work/docs", "work/readme.txt"], &options).unwrap();
/// ```
pub fn write_tar<W: Write, P: AsRef<Path>>(
    writer: W,
    paths: &[P],
    options: &ArchiveOptions,
) -> Result<W> {
    let mut archiver = Archiver::new(writer, options.clone());
    for path in paths {
        archiver.append_path(path.as_ref())?;
    }
    archiver.finish()
}

/// Like [`write_tar`] but also computes the digest `D` of every byte that was written to `writer`.
///
/// The digest is computed while the archive is written, the archive is never read back.
pub fn write_tar_with_digest<D: Digest + Default, W: Write, P: AsRef<Path>>(
    writer: W,
    paths: &[P],
    options: &ArchiveOptions,
) -> Result<(W, Output<D>)> {
    let writer = write_tar(HashingWriter::<_, D>::new(writer), paths, options)?;
    Ok(writer.finalize())
}

/// Creates (or truncates) the file at `archive_path` and writes the given paths to it as a tar
/// archive.
pub fn create_tar<P: AsRef<Path>>(
    archive_path: &Path,
    paths: &[P],
    options: &ArchiveOptions,
) -> Result<()> {
    let file = fs_err::File::create(archive_path).map_err(|err| Error::io(archive_path, err))?;
    let mut writer = write_tar(std::io::BufWriter::new(file), paths, options)?;
    writer.flush().map_err(|err| Error::io(archive_path, err))
}

/// Like [`write_tar`] but wraps the archive in a gzip stream.
pub fn write_tar_gz<W: Write, P: AsRef<Path>>(
    writer: W,
    paths: &[P],
    options: &ArchiveOptions,
    compression_level: CompressionLevel,
) -> Result<W> {
    let encoder = flate2::write::GzEncoder::new(writer, compression_level.to_gzip_level()?);
    write_tar(encoder, paths, options)?
        .finish()
        .map_err(Error::Sink)
}

/// Like [`write_tar_gz`] but also computes the digest `D` of the compressed bytes that were written
/// to `writer`.
pub fn write_tar_gz_with_digest<D: Digest + Default, W: Write, P: AsRef<Path>>(
    writer: W,
    paths: &[P],
    options: &ArchiveOptions,
    compression_level: CompressionLevel,
) -> Result<(W, Output<D>)> {
    let writer = write_tar_gz(
        HashingWriter::<_, D>::new(writer),
        paths,
        options,
        compression_level,
    )?;
    Ok(writer.finalize())
}
