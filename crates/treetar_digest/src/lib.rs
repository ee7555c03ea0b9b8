#![deny(missing_docs)]

//! Hashing helpers used to fingerprint archives while they are streamed.
//!
//! The central type is [`HashingWriter`]: it forwards every write to a wrapped [`Write`] and feeds
//! exactly the bytes the wrapped writer accepted into a [`Digest`]. Putting it between an archive
//! builder and its final sink yields a fingerprint of the archive without reading it back.
//!
//! Digests are commonly transported base64 encoded (e.g. in RFC 3230 `Digest` headers), which is
//! why [`HashingWriter::base64_sum`] and [`encode_base64`] exist next to the hex helpers.
//!
//! # Examples
//!
//! ```
//! use std::io::Write;
//! use treetar_digest::{HashingWriter, Sha1};
//!
//! let mut writer = HashingWriter::<_, Sha1>::new(Vec::new());
//! writer.write_all(b"abc").unwrap();
//! let (bytes, fingerprint) = writer.finalize_base64();
//! assert_eq!(bytes, b"abc");
//! assert_eq!(fingerprint, "qZk+NkcGgWq6PiVxeFDCbJzQ2J0=");
//! ```
//!
//! # Available functions
//!
//! - [`compute_file_digest`]: Computes the hash of a file on disk.
//! - [`compute_bytes_digest`]: Computes the hash of an in-memory buffer.
//! - [`parse_digest_from_hex`] / [`parse_digest_from_base64`]: Parse an encoded digest back to
//!   bytes.
//! - [`HashingWriter`] / [`HashingReader`]: Wrap a writer or reader and hash the bytes that flow
//!   through it.

pub use digest;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use digest::{Digest, Output};
use std::io::{Read, Write};
use std::{fs::File, path::Path};

pub use md5::Md5;
pub use sha1::Sha1;
pub use sha2::Sha256;

/// A type alias for the output of a SHA1 hash.
pub type Sha1Hash = sha1::digest::Output<Sha1>;

/// A type alias for the output of a SHA256 hash.
pub type Sha256Hash = sha2::digest::Output<Sha256>;

/// A type alias for the output of an MD5 hash.
pub type Md5Hash = md5::digest::Output<Md5>;

/// Compute a hash of the file at the specified location.
pub fn compute_file_digest<D: Digest + Default + Write>(
    path: impl AsRef<Path>,
) -> Result<Output<D>, std::io::Error> {
    let mut file = File::open(path)?;

    let mut hasher = D::default();
    std::io::copy(&mut file, &mut hasher)?;

    Ok(hasher.finalize())
}

/// Compute a hash of the specified bytes.
pub fn compute_bytes_digest<D: Digest + Default>(bytes: impl AsRef<[u8]>) -> Output<D> {
    let mut hasher = D::default();
    hasher.update(bytes);
    hasher.finalize()
}

/// Encodes a digest with the standard base64 alphabet, including padding.
pub fn encode_base64(digest: impl AsRef<[u8]>) -> String {
    STANDARD.encode(digest)
}

/// Parses a hash hex string to a digest.
pub fn parse_digest_from_hex<D: Digest>(str: &str) -> Option<Output<D>> {
    let mut hash = <Output<D>>::default();
    match hex::decode_to_slice(str, &mut hash) {
        Ok(_) => Some(hash),
        Err(_) => None,
    }
}

/// Parses a standard base64 string to a digest. Returns `None` if the string is not valid base64
/// or does not decode to exactly one digest worth of bytes.
pub fn parse_digest_from_base64<D: Digest>(str: &str) -> Option<Output<D>> {
    let bytes = STANDARD.decode(str).ok()?;
    let mut hash = <Output<D>>::default();
    if bytes.len() != hash.len() {
        return None;
    }
    hash.copy_from_slice(&bytes);
    Some(hash)
}

/// A [`Write`] implementation that forwards to a wrapped writer and hashes every byte the wrapped
/// writer accepted. Call [`HashingWriter::finalize`] to retrieve both the original `impl Write`
/// object as well as the hash.
///
/// If the wrapped writer performs a short write only the accepted prefix is hashed, so the digest
/// always describes exactly the bytes that reached the writer. Errors of the wrapped writer are
/// returned as-is and nothing is hashed for that call.
pub struct HashingWriter<W, D: Digest> {
    writer: W,
    hasher: D,
}

impl<W, D: Digest + Default> HashingWriter<W, D> {
    /// Constructs a new instance from a writer and a new (empty) hasher.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            hasher: Default::default(),
        }
    }
}

impl<W, D: Digest> HashingWriter<W, D> {
    /// Consumes this instance and returns the original writer and the hash of all bytes written to
    /// this instance.
    pub fn finalize(self) -> (W, Output<D>) {
        (self.writer, self.hasher.finalize())
    }

    /// Like [`HashingWriter::finalize`] but returns the hash base64 encoded.
    pub fn finalize_base64(self) -> (W, String) {
        let (writer, hash) = self.finalize();
        (writer, encode_base64(hash))
    }

    /// Returns a reference to the wrapped writer.
    pub fn get_ref(&self) -> &W {
        &self.writer
    }
}

impl<W, D: Digest + Clone> HashingWriter<W, D> {
    /// Returns the hash of the bytes written so far without consuming the writer.
    ///
    /// Only meaningful once the write session is complete; calling it earlier yields the hash of
    /// the prefix written up to that point.
    pub fn sum(&self) -> Output<D> {
        self.hasher.clone().finalize()
    }

    /// The base64 encoded form of [`HashingWriter::sum`].
    pub fn base64_sum(&self) -> String {
        encode_base64(self.sum())
    }

    /// The lowercase hex encoded form of [`HashingWriter::sum`].
    pub fn hex_sum(&self) -> String {
        hex::encode(self.sum())
    }
}

impl<W: Write, D: Digest> Write for HashingWriter<W, D> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let bytes = self.writer.write(buf)?;
        self.hasher.update(&buf[..bytes]);
        Ok(bytes)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

/// A simple object that provides a [`Read`] implementation that also immediately hashes the bytes
/// read from it. Call [`HashingReader::finalize`] to retrieve both the original `impl Read`
/// object as well as the hash.
pub struct HashingReader<R, D: Digest> {
    reader: R,
    hasher: D,
}

impl<R, D: Digest + Default> HashingReader<R, D> {
    /// Constructs a new instance from a reader and a new (empty) hasher.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            hasher: Default::default(),
        }
    }
}

impl<R, D: Digest> HashingReader<R, D> {
    /// Consumes this instance and returns the original reader and the hash of all bytes read from
    /// this instance.
    pub fn finalize(self) -> (R, Output<D>) {
        (self.reader, self.hasher.finalize())
    }
}

impl<R: Read, D: Digest> Read for HashingReader<R, D> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let bytes_read = self.reader.read(buf)?;
        self.hasher.update(&buf[..bytes_read]);
        Ok(bytes_read)
    }
}

#[cfg(test)]
mod test {
    use super::{HashingReader, HashingWriter};
    use rstest::rstest;
    use sha1::Sha1;
    use sha2::Sha256;
    use std::io::{Read, Write};

    /// Accepts at most `limit` bytes per call.
    struct ShortWriter {
        written: Vec<u8>,
        limit: usize,
    }

    impl Write for ShortWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let n = buf.len().min(self.limit);
            self.written.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("<failed>"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[rstest]
    #[case(
        "1234567890",
        "c775e7b757ede630cd0aa1113bd102661ab38829ca52a6422ab782862f268646"
    )]
    #[case(
        "Hello, world!",
        "315f5bdb76d078c43b8ac0064e4a0164612b1fce77c869345bfc94c75894edd3"
    )]
    fn test_compute_file_sha256(#[case] input: &str, #[case] expected_hash: &str) {
        // Write a known value to a temporary file and verify that the compute hash matches what we would
        // expect.

        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("test");
        std::fs::write(&file_path, input).unwrap();
        let hash = super::compute_file_digest::<sha2::Sha256>(&file_path).unwrap();

        assert_eq!(format!("{hash:x}"), expected_hash);
    }

    #[rstest]
    #[case("", "2jmj7l5rSw0yVb/vlWAYkK/YBwk=")]
    #[case("abc", "qZk+NkcGgWq6PiVxeFDCbJzQ2J0=")]
    #[case("spam", "3tmC5wLge7e27/r9w1PbP+FyyD8=")]
    fn test_hashing_writer_base64_sha1(#[case] input: &str, #[case] expected: &str) {
        let mut writer = HashingWriter::<_, Sha1>::new(Vec::new());
        writer.write_all(input.as_bytes()).unwrap();
        assert_eq!(writer.base64_sum(), expected);

        let (written, fingerprint) = writer.finalize_base64();
        assert_eq!(written, input.as_bytes());
        assert_eq!(fingerprint, expected);
    }

    #[test]
    fn test_hashing_writer_empty_write() {
        let mut writer = HashingWriter::<_, Sha1>::new(Vec::new());
        assert_eq!(writer.write(&[]).unwrap(), 0);
        assert_eq!(writer.hex_sum(), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
        assert!(writer.get_ref().is_empty());
    }

    #[test]
    fn test_hashing_writer_short_writes() {
        let mut writer = HashingWriter::<_, Sha1>::new(ShortWriter {
            written: Vec::new(),
            limit: 2,
        });

        // A single call only hashes what the inner writer accepted.
        assert_eq!(writer.write(b"spam").unwrap(), 2);
        assert_eq!(writer.sum(), super::compute_bytes_digest::<Sha1>("sp"));

        writer.write_all(b"am").unwrap();
        let (inner, hash) = writer.finalize();
        assert_eq!(inner.written, b"spam");
        assert_eq!(hash, super::compute_bytes_digest::<Sha1>("spam"));
    }

    #[test]
    fn test_hashing_writer_error_is_not_hashed() {
        let mut writer = HashingWriter::<_, Sha1>::new(FailingWriter);
        let err = writer.write(b"spam").unwrap_err();
        assert_eq!(err.to_string(), "<failed>");
        assert_eq!(writer.base64_sum(), "2jmj7l5rSw0yVb/vlWAYkK/YBwk=");
    }

    #[rstest]
    #[case(
        "1234567890",
        "c775e7b757ede630cd0aa1113bd102661ab38829ca52a6422ab782862f268646"
    )]
    #[case(
        "Hello, world!",
        "315f5bdb76d078c43b8ac0064e4a0164612b1fce77c869345bfc94c75894edd3"
    )]
    fn test_hashing_reader_sha256(#[case] input: &str, #[case] expected_hash: &str) {
        let mut cursor = HashingReader::<_, Sha256>::new(std::io::Cursor::new(input));
        let mut cursor_string = String::new();
        cursor.read_to_string(&mut cursor_string).unwrap();
        assert_eq!(&cursor_string, input);
        let (_, hash) = cursor.finalize();
        assert_eq!(format!("{hash:x}"), expected_hash);
    }

    #[test]
    fn test_parse_encoded_digests() {
        let expected = super::compute_bytes_digest::<Sha1>("abc");
        assert_eq!(
            super::parse_digest_from_base64::<Sha1>("qZk+NkcGgWq6PiVxeFDCbJzQ2J0="),
            Some(expected)
        );
        assert_eq!(
            super::parse_digest_from_hex::<Sha1>("a9993e364706816aba3e25717850c26c9cd0d89d"),
            Some(expected)
        );

        // Valid base64, wrong length.
        assert_eq!(super::parse_digest_from_base64::<Sha1>("c3BhbQ=="), None);
        assert_eq!(super::parse_digest_from_base64::<Sha1>("not base64!"), None);
        assert_eq!(super::encode_base64(b"spam"), "c3BhbQ==");
    }
}
