//! Streaming file hasher for prefix and full-content digests.
//!
//! # Overview
//!
//! The [`Hasher`] computes a [`Digest`] either over a file's leading
//! [`PREFIX_SIZE`] bytes ("small hash") or over its whole content ("full
//! hash"). Files are read in [`CHUNK_SIZE`] chunks so memory use does not
//! depend on file size.
//!
//! The digest algorithm is injectable per mode. Defaults: XXH3-64 for the
//! prefix (a cheap pre-filter, a collision only costs a full hash) and
//! BLAKE3 for the full hash (256-bit, it decides the final duplicate claim).

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{AccessError, FileRef};

/// Bytes read for the prefix hash.
pub const PREFIX_SIZE: usize = 1024;

/// Read buffer size for streaming.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Digest algorithm selection.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// XXH3 64-bit (non-cryptographic, fastest)
    #[default]
    Xxh3,
    /// XXH3 128-bit (non-cryptographic)
    Xxh128,
    /// BLAKE3 256-bit
    Blake3,
    /// SHA-256
    Sha256,
}

impl HashAlgorithm {
    /// Length in bytes of digests produced by this algorithm.
    #[must_use]
    pub fn digest_len(self) -> usize {
        match self {
            Self::Xxh3 => 8,
            Self::Xxh128 => 16,
            Self::Blake3 | Self::Sha256 => 32,
        }
    }

    fn start(self) -> StreamState {
        match self {
            Self::Xxh3 | Self::Xxh128 => StreamState::Xxh3(Box::new(xxhash_rust::xxh3::Xxh3::new())),
            Self::Blake3 => StreamState::Blake3(Box::new(blake3::Hasher::new())),
            Self::Sha256 => {
                use sha2::Digest as _;
                StreamState::Sha256(sha2::Sha256::new())
            }
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Xxh3 => write!(f, "xxh3"),
            Self::Xxh128 => write!(f, "xxh128"),
            Self::Blake3 => write!(f, "blake3"),
            Self::Sha256 => write!(f, "sha256"),
        }
    }
}

/// Incremental state for one digest computation.
enum StreamState {
    Xxh3(Box<xxhash_rust::xxh3::Xxh3>),
    Blake3(Box<blake3::Hasher>),
    Sha256(sha2::Sha256),
}

impl StreamState {
    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Xxh3(h) => h.update(data),
            Self::Blake3(h) => {
                h.update(data);
            }
            Self::Sha256(h) => {
                use sha2::Digest as _;
                h.update(data);
            }
        }
    }

    fn finish(self, algorithm: HashAlgorithm) -> Digest {
        let bytes = match self {
            Self::Xxh3(h) if algorithm == HashAlgorithm::Xxh128 => {
                h.digest128().to_be_bytes().to_vec()
            }
            Self::Xxh3(h) => h.digest().to_be_bytes().to_vec(),
            Self::Blake3(h) => h.finalize().as_bytes().to_vec(),
            Self::Sha256(h) => {
                use sha2::Digest as _;
                h.finalize().to_vec()
            }
        };
        Digest(bytes)
    }
}

/// Fixed-length digest of file bytes, compared byte for byte.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest(Vec<u8>);

impl Digest {
    /// Wrap raw digest bytes.
    #[must_use]
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Raw digest bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Lowercase hexadecimal form.
    #[must_use]
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl Serialize for Digest {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// How much of a file to hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashMode {
    /// At most this many leading bytes
    Prefix(usize),
    /// Entire content
    Full,
}

/// File hasher with per-mode algorithms.
#[derive(Debug, Clone)]
pub struct Hasher {
    prefix_algorithm: HashAlgorithm,
    full_algorithm: HashAlgorithm,
    prefix_len: usize,
    chunk_size: usize,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher {
    /// Hasher with XXH3 prefix digests over [`PREFIX_SIZE`] bytes and BLAKE3
    /// full digests.
    #[must_use]
    pub fn new() -> Self {
        Self {
            prefix_algorithm: HashAlgorithm::Xxh3,
            full_algorithm: HashAlgorithm::Blake3,
            prefix_len: PREFIX_SIZE,
            chunk_size: CHUNK_SIZE,
        }
    }

    /// Set the algorithm used in prefix mode.
    #[must_use]
    pub fn with_prefix_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.prefix_algorithm = algorithm;
        self
    }

    /// Set the algorithm used in full mode.
    #[must_use]
    pub fn with_full_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.full_algorithm = algorithm;
        self
    }

    /// Set the number of leading bytes hashed in prefix mode.
    #[must_use]
    pub fn with_prefix_len(mut self, len: usize) -> Self {
        self.prefix_len = len.max(1);
        self
    }

    /// Set the read buffer size.
    #[must_use]
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Prefix length used by [`Hasher::prefix_mode`].
    #[must_use]
    pub fn prefix_len(&self) -> usize {
        self.prefix_len
    }

    /// The configured prefix mode.
    #[must_use]
    pub fn prefix_mode(&self) -> HashMode {
        HashMode::Prefix(self.prefix_len)
    }

    /// Algorithm used for the given mode.
    #[must_use]
    pub fn algorithm_for(&self, mode: HashMode) -> HashAlgorithm {
        match mode {
            HashMode::Prefix(_) => self.prefix_algorithm,
            HashMode::Full => self.full_algorithm,
        }
    }

    /// Hash a file in the given mode.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError`] if the file cannot be opened or a read fails.
    pub fn hash(&self, path: &Path, mode: HashMode) -> Result<Digest, AccessError> {
        self.hash_counted(path, mode).map(|(digest, _)| digest)
    }

    /// Hash the first [`Hasher::prefix_len`] bytes of a file.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError`] if the file cannot be read.
    pub fn prehash(&self, path: &Path) -> Result<Digest, AccessError> {
        self.hash(path, self.prefix_mode())
    }

    /// Hash the entire content of a file.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError`] if the file cannot be read.
    pub fn full_hash(&self, path: &Path) -> Result<Digest, AccessError> {
        self.hash(path, HashMode::Full)
    }

    /// Hash an enumerated file, checking that the bytes read still match
    /// the size observed at enumeration time.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::SizeChanged`] when the file was truncated or
    /// grew, or any other [`AccessError`] from reading.
    pub fn hash_file(&self, file: &FileRef, mode: HashMode) -> Result<Digest, AccessError> {
        let (digest, read) = self.hash_counted(&file.path, mode)?;
        let expected = match mode {
            HashMode::Prefix(len) => file.size.min(len as u64),
            HashMode::Full => file.size,
        };

        if read != expected {
            return Err(AccessError::SizeChanged {
                path: file.path.clone(),
                expected,
                actual: read,
            });
        }
        Ok(digest)
    }

    fn hash_counted(&self, path: &Path, mode: HashMode) -> Result<(Digest, u64), AccessError> {
        let algorithm = self.algorithm_for(mode);
        let file = File::open(path).map_err(|e| AccessError::from_io(path, e))?;

        let limit = match mode {
            HashMode::Prefix(len) => len as u64,
            HashMode::Full => u64::MAX,
        };
        let mut reader = file.take(limit);
        let mut state = algorithm.start();
        let mut buffer = vec![0u8; self.chunk_size.min(limit as usize).max(1)];
        let mut total = 0u64;

        loop {
            let n = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(AccessError::from_io(path, e)),
            };
            state.update(&buffer[..n]);
            total += n as u64;
        }

        log::trace!("Hashed {} bytes of {} ({})", total, path.display(), algorithm);
        Ok((state.finish(algorithm), total))
    }
}
