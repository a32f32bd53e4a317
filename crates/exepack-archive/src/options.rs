use std::io::{Read, Write};

use crate::error::Result;

pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Hash computation strategies applied while extracting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum HashStrategy {
    #[default]
    None,
    Sha256,
}

#[derive(Clone, Debug)]
pub struct ExtractOptions {
    pub hash_strategy: HashStrategy,
    pub buffer_size: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            hash_strategy: HashStrategy::None,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl ExtractOptions {
    pub fn hash_strategy(mut self, strategy: HashStrategy) -> Self {
        self.hash_strategy = strategy;
        self
    }

    pub fn buffer_size(mut self, bytes: usize) -> Self {
        self.buffer_size = bytes.max(1);
        self
    }
}

/// Per-entry compression used when writing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    Deflated,
    Stored,
}

impl Compression {
    pub(crate) fn method(self) -> zip::CompressionMethod {
        match self {
            Self::Deflated => zip::CompressionMethod::Deflated,
            Self::Stored => zip::CompressionMethod::Stored,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct WriteOptions {
    pub buffer_size: usize,
    pub compression: Compression,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            compression: Compression::Deflated,
        }
    }
}

impl WriteOptions {
    pub fn buffer_size(mut self, bytes: usize) -> Self {
        self.buffer_size = bytes.max(1);
        self
    }

    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }
}

/// Incremental digest fed by [`copy_bounded`].
pub(crate) enum Digest {
    Sha256(sha2::Sha256),
}

impl Digest {
    pub(crate) fn for_strategy(strategy: HashStrategy) -> Option<Self> {
        match strategy {
            HashStrategy::None => None,
            HashStrategy::Sha256 => Some(Self::Sha256(<sha2::Sha256 as sha2::Digest>::new())),
        }
    }

    fn update(&mut self, chunk: &[u8]) {
        match self {
            Self::Sha256(hasher) => sha2::Digest::update(hasher, chunk),
        }
    }

    pub(crate) fn finish(self) -> String {
        match self {
            Self::Sha256(hasher) => hex::encode(sha2::Digest::finalize(hasher)),
        }
    }
}

/// Stream `reader` into `writer` through one buffer of `buffer_size` bytes.
pub(crate) fn copy_bounded<R: Read + ?Sized, W: Write + ?Sized>(
    reader: &mut R,
    writer: &mut W,
    buffer_size: usize,
    mut digest: Option<&mut Digest>,
) -> std::io::Result<u64> {
    let mut buffer = vec![0u8; buffer_size.max(1)];
    let mut total = 0u64;
    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if let Some(digest) = digest.as_deref_mut() {
            digest.update(&buffer[..n]);
        }
        writer.write_all(&buffer[..n])?;
        total += n as u64;
    }
    Ok(total)
}

/// SHA-256 of a stream, hex encoded.
pub fn sha256_hex<R: Read + ?Sized>(reader: &mut R) -> Result<String> {
    let mut digest = Digest::Sha256(<sha2::Sha256 as sha2::Digest>::new());
    copy_bounded(reader, &mut std::io::sink(), DEFAULT_BUFFER_SIZE, Some(&mut digest))?;
    Ok(digest.finish())
}
