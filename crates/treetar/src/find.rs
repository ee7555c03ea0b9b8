//! Locating and inspecting single entries of an archive without extracting it.

use std::io::Read;
use std::path::{Path, PathBuf};

use crate::node::EntryKind;
use crate::{Error, Result};

/// A regular file found in an archive by [`find_file`].
///
/// Reading from it yields exactly the content of the entry; the rest of the archive is left
/// unread in the underlying reader.
#[derive(Debug)]
pub struct ArchivedFile<R> {
    header: tar::Header,
    name: String,
    size: u64,
    content: std::io::Take<R>,
}

impl<R> ArchivedFile<R> {
    /// The header of the entry.
    pub fn header(&self) -> &tar::Header {
        &self.header
    }

    /// The name of the entry as stored in the archive.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The number of content bytes the header declares.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns the underlying reader, positioned somewhere inside the entry content.
    pub fn into_inner(self) -> R {
        self.content.into_inner()
    }
}

impl<R: Read> Read for ArchivedFile<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.content.read(buf)
    }
}

/// Scans the archive read from `reader` for the first entry named `name`.
///
/// The name is compared after the archive's own path normalization, so `docs/notes.txt` also
/// matches an entry stored as `./docs/notes.txt`. Returns [`Error::NotFound`] if the archive ends
/// without a match.
pub fn find_file<R: Read>(reader: R, name: &str) -> Result<ArchivedFile<R>> {
    let mut archive = tar::Archive::new(reader);
    let wanted = Path::new(name);

    let (header, size) = {
        let entries = archive
            .entries()
            .map_err(|err| Error::format("the start of the archive", err))?;
        let mut found = None;
        for (index, entry) in entries.enumerate() {
            let entry = entry.map_err(|err| Error::format(format!("entry #{index}"), err))?;
            let path = entry
                .path()
                .map_err(|err| Error::format(format!("entry #{index}"), err))?;
            if path.as_ref() == wanted {
                found = Some((entry.header().clone(), entry.size()));
                break;
            }
        }
        found.ok_or_else(|| Error::NotFound(name.to_string()))?
    };

    tracing::debug!("found {name} ({size} bytes)");
    Ok(ArchivedFile {
        header,
        name: name.to_string(),
        size,
        content: archive.into_inner().take(size),
    })
}

/// Like [`find_file`] but for a gzip compressed archive.
///
/// The name must be relative, archives never contain absolute entry names.
pub fn extract_archived_file<R: Read>(
    reader: R,
    name: &str,
) -> Result<ArchivedFile<flate2::read::GzDecoder<R>>> {
    if Path::new(name).has_root() {
        return Err(Error::InvalidName(name.to_string()));
    }
    find_file(flate2::read::GzDecoder::new(reader), name)
}

/// Describes a single entry of an archive, as returned by [`list_entries`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    /// The entry name, `/` separated.
    pub name: String,
    /// The kind of the entry.
    pub kind: EntryKind,
    /// The number of content bytes.
    pub size: u64,
    /// The permission bits stored in the header.
    pub mode: u32,
    /// The target of a symlink entry.
    pub link_target: Option<PathBuf>,
    /// The modification time in seconds since the epoch.
    pub mtime: u64,
}

/// Lists the entries of the archive read from `reader` in archive order, without writing anything
/// to disk.
pub fn list_entries(reader: impl Read) -> Result<Vec<EntryInfo>> {
    let mut archive = tar::Archive::new(reader);
    let entries = archive
        .entries()
        .map_err(|err| Error::format("the start of the archive", err))?;

    let mut result = Vec::new();
    for (index, entry) in entries.enumerate() {
        let entry = entry.map_err(|err| Error::format(format!("entry #{index}"), err))?;
        let name = entry
            .path()
            .map_err(|err| Error::format(format!("entry #{index}"), err))?
            .to_string_lossy()
            .replace('\\', "/");
        let header = entry.header();
        let link_target = entry
            .link_name()
            .map_err(|err| Error::format(&name, err))?
            .map(|target| target.into_owned());

        result.push(EntryInfo {
            kind: EntryKind::from(header.entry_type()),
            size: entry.size(),
            mode: header.mode().map_err(|err| Error::format(&name, err))?,
            mtime: header.mtime().map_err(|err| Error::format(&name, err))?,
            link_target,
            name,
        });
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Write;

    fn archive_with(files: &[(&str, &str)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            builder
                .append_data(&mut header, name, content.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap()
    }

    #[test]
    fn test_find_file_reads_only_the_entry() {
        let archive = archive_with(&[("a.txt", "first"), ("docs/notes.txt", "hello"), ("z", "zz")]);

        let mut file = find_file(archive.as_slice(), "docs/notes.txt").unwrap();
        assert_eq!(file.name(), "docs/notes.txt");
        assert_eq!(file.size(), 5);

        let mut content = String::new();
        file.read_to_string(&mut content).unwrap();
        assert_eq!(content, "hello");
    }

    #[test]
    fn test_find_file_returns_first_match() {
        let archive = archive_with(&[("dup", "one"), ("dup", "two")]);

        let mut content = Vec::new();
        find_file(archive.as_slice(), "dup")
            .unwrap()
            .read_to_end(&mut content)
            .unwrap();
        assert_eq!(content, b"one");
    }

    #[test]
    fn test_find_file_not_found() {
        let archive = archive_with(&[("a.txt", "first")]);

        let result = find_file(archive.as_slice(), "missing.txt");
        assert_matches!(result, Err(Error::NotFound(ref name)) if name == "missing.txt");
        assert_eq!(
            result.err().map(|err| err.to_string()).as_deref(),
            Some("missing.txt not found")
        );
    }

    #[test]
    fn test_extract_archived_file_from_gzip() {
        let archive = archive_with(&[("pkg/info.json", r#"{"name":"spam"}"#)]);
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&archive).unwrap();
        let compressed = encoder.finish().unwrap();

        let mut content = String::new();
        extract_archived_file(compressed.as_slice(), "pkg/info.json")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, r#"{"name":"spam"}"#);
    }

    #[cfg(unix)]
    #[test]
    fn test_extract_archived_file_rejects_absolute_names() {
        let result = extract_archived_file(std::io::empty(), "/etc/passwd");
        assert_matches!(result, Err(Error::InvalidName(_)));
    }

    #[test]
    fn test_list_entries() {
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Directory);
        header.set_size(0);
        header.set_mode(0o755);
        builder.append_data(&mut header, "docs", std::io::empty()).unwrap();

        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Symlink);
        header.set_size(0);
        header.set_mode(0o777);
        builder.append_link(&mut header, "docs/link", "notes.txt").unwrap();
        let archive = builder.into_inner().unwrap();

        let entries = list_entries(archive.as_slice()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "docs");
        assert_eq!(entries[0].kind, EntryKind::Directory);
        assert_eq!(entries[0].mode, 0o755);
        assert_eq!(entries[1].kind, EntryKind::Symlink);
        assert_eq!(entries[1].size, 0);
        assert_eq!(entries[1].link_target, Some(PathBuf::from("notes.txt")));
    }
}
