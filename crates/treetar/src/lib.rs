#![deny(missing_docs)]

//! Streams directory trees into tar archives and reconstructs them again.
//!
//! The [`write`] module turns a list of filesystem paths into a tar stream, optionally computing a
//! digest of the exact bytes that reach the sink. The [`read`] module recreates a tree from such a
//! stream, and [`find`] locates single entries without extracting anything.
//!
//! ```no_run
//! # fn main() -> treetar::Result<()> {
//! let file = fs_err::File::create("work.tar").expect("create archive");
//! let digest = treetar::tar_files(&["work/docs", "work/readme.txt"], file, Some("work/".as_ref()))?;
//! println!("Digest: sha={digest}");
//!
//! let archive = fs_err::File::open("work.tar").expect("open archive");
//! treetar::untar_files(archive, "restored".as_ref())?;
//! # Ok(())
//! # }
//! ```

use std::io::{Read, Write};
use std::path::Path;

use treetar_digest::{encode_base64, Sha1};

mod error;
pub mod find;
pub mod node;
pub mod options;
pub mod read;
pub mod write;

pub use error::{Error, Result};
pub use find::{extract_archived_file, find_file, list_entries, ArchivedFile, EntryInfo};
pub use node::{EntryKind, NodeKind};
pub use options::{ArchiveOptions, CompressionLevel, ExtractOptions, MetadataMode, SymlinkTargets};
pub use read::{extract, extract_with_options};
pub use write::{create_tar, Archiver};

/// Writes `paths` (recursively) as a tar archive to `writer` and returns the base64 encoded SHA-1
/// digest of every byte written, in the format used by the HTTP `Digest` header.
///
/// `strip_prefix` is removed from the beginning of every entry name. All other options use their
/// defaults, see [`write::write_tar_with_digest`] for full control.
pub fn tar_files<W: Write, P: AsRef<Path>>(
    paths: &[P],
    writer: W,
    strip_prefix: Option<&Path>,
) -> Result<String> {
    let (_, digest) = write::write_tar_with_digest::<Sha1, _, _>(
        writer,
        paths,
        &archive_options(strip_prefix),
    )?;
    Ok(encode_base64(digest))
}

/// Like [`tar_files`] but compresses the archive with gzip. The digest covers the compressed
/// bytes.
pub fn tar_gz_files<W: Write, P: AsRef<Path>>(
    paths: &[P],
    writer: W,
    strip_prefix: Option<&Path>,
    compression_level: CompressionLevel,
) -> Result<String> {
    let (_, digest) = write::write_tar_gz_with_digest::<Sha1, _, _>(
        writer,
        paths,
        &archive_options(strip_prefix),
        compression_level,
    )?;
    Ok(encode_base64(digest))
}

/// Extracts the tar archive read from `reader` into `destination` using the default options.
pub fn untar_files(reader: impl Read, destination: &Path) -> Result<()> {
    read::extract(reader, destination)
}

fn archive_options(strip_prefix: Option<&Path>) -> ArchiveOptions {
    match strip_prefix {
        Some(prefix) => ArchiveOptions::default().with_strip_prefix(prefix),
        None => ArchiveOptions::default(),
    }
}
