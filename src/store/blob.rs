//! Blob pipeline - hash and compress in one pass, decompress on read

use crate::config::StoreOptions;
use crate::model::{Digest, DigestWriter};
use std::fs::File;
use std::io::{self, BufRead, BufReader, ErrorKind, Read, Write};
use std::path::Path;

/// A `Write` adapter that digests every chunk before handing it on.
///
/// Wrapped around a compressing writer, each chunk of the payload is hashed
/// and compressed in the same pass without being retained.
pub(crate) struct HashingWriter<W> {
    inner: W,
    digest: DigestWriter,
    written: u64,
}

impl<W: Write> HashingWriter<W> {
    pub(crate) fn new(inner: W) -> Self {
        HashingWriter {
            inner,
            digest: DigestWriter::new(),
            written: 0,
        }
    }

    /// Split into the inner writer, the digest, and the byte count
    pub(crate) fn into_parts(self) -> (W, Digest, u64) {
        let digest = self.digest.finalize();
        (self.inner, digest, self.written)
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // Only digest what the inner writer actually took
        let n = self.inner.write(buf)?;
        self.digest.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Stream `source` through the hash + zstd pipeline into `sink`.
///
/// Returns the digest of the uncompressed bytes and their count. The sink is
/// closed on return.
pub(crate) fn compress_stream<R: Read>(
    mut source: R,
    sink: File,
    options: &StoreOptions,
) -> io::Result<(Digest, u64)> {
    let encoder = zstd::Encoder::new(sink, options.compression_level)?;
    let mut writer = HashingWriter::new(encoder);

    let mut buf = vec![0u8; options.buffer_size];
    loop {
        let n = match source.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buf[..n])?;
    }

    let (encoder, digest, len) = writer.into_parts();
    let file = encoder.finish()?;
    if options.sync_writes {
        file.sync_all()?;
    }
    Ok((digest, len))
}

/// First bytes of every zstd frame (0xFD2FB528, little endian)
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// Reader over a stored blob, yielding the original bytes
pub struct BlobReader {
    digest: Digest,
    decoder: zstd::Decoder<'static, BufReader<File>>,
}

impl BlobReader {
    /// Open the blob file at `path`.
    ///
    /// A missing file comes back as `ErrorKind::NotFound`; a file that does
    /// not start with a zstd frame header as `ErrorKind::InvalidData`.
    pub fn open(path: &Path, digest: Digest) -> io::Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        if !reader.fill_buf()?.starts_with(&ZSTD_MAGIC) {
            return Err(io::Error::new(
                ErrorKind::InvalidData,
                format!("blob {} is not a zstd frame", digest.short()),
            ));
        }
        let decoder = zstd::Decoder::with_buffer(reader)?;
        Ok(BlobReader { digest, decoder })
    }

    /// Digest of the blob being read
    pub fn digest(&self) -> Digest {
        self.digest
    }

    /// Read the remaining content into memory
    pub fn read_all(mut self) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        self.decoder.read_to_end(&mut out)?;
        Ok(out)
    }
}

impl Read for BlobReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.decoder.read(buf)
    }
}

impl std::fmt::Debug for BlobReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobReader")
            .field("digest", &self.digest)
            .finish_non_exhaustive()
    }
}
