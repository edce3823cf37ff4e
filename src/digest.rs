use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;
use xxhash_rust::xxh32::Xxh32;

/// Default read buffer size: 32 MiB.
pub const DEFAULT_BUFFER_SIZE: usize = 32 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    #[error("IO error: {0}")]
    Io(std::io::Error),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("File modified during checksumming: {0}")]
    ConcurrentModification(PathBuf),
}

/// The checksum algorithm used for a whole run.
///
/// Manifests do not carry the algorithm in their baseline format, so scanning
/// and verifying must agree on it. Non-default algorithms are noted in an
/// optional header line (see `manifest::serialize_header`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum DigestAlgorithm {
    /// CRC-32C (Castagnoli).
    #[default]
    #[value(name = "crc32c")]
    Crc32c,
    #[value(name = "sha256")]
    Sha256,
    /// xxHash32 with seed 0.
    #[value(name = "xxh32")]
    Xxh32,
}

impl DigestAlgorithm {
    pub fn name(self) -> &'static str {
        match self {
            DigestAlgorithm::Crc32c => "crc32c",
            DigestAlgorithm::Sha256 => "sha256",
            DigestAlgorithm::Xxh32 => "xxh32",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "crc32c" => Some(DigestAlgorithm::Crc32c),
            "sha256" => Some(DigestAlgorithm::Sha256),
            "xxh32" => Some(DigestAlgorithm::Xxh32),
            _ => None,
        }
    }

    /// Number of hex characters in a digest produced by this algorithm.
    pub fn hex_width(self) -> usize {
        match self {
            DigestAlgorithm::Crc32c | DigestAlgorithm::Xxh32 => 8,
            DigestAlgorithm::Sha256 => 64,
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

enum Hasher {
    Crc32c(u32),
    Sha256(Sha256),
    Xxh32(Xxh32),
}

impl Hasher {
    fn new(algorithm: DigestAlgorithm) -> Self {
        match algorithm {
            DigestAlgorithm::Crc32c => Hasher::Crc32c(0),
            DigestAlgorithm::Sha256 => Hasher::Sha256(Sha256::new()),
            DigestAlgorithm::Xxh32 => Hasher::Xxh32(Xxh32::new(0)),
        }
    }

    fn update(&mut self, bytes: &[u8]) {
        match self {
            Hasher::Crc32c(crc) => *crc = crc32c::crc32c_append(*crc, bytes),
            Hasher::Sha256(hasher) => hasher.update(bytes),
            Hasher::Xxh32(hasher) => hasher.update(bytes),
        }
    }

    /// Upper-case hex, big-endian for the 32-bit checksums.
    fn finish_hex(self) -> String {
        match self {
            Hasher::Crc32c(crc) => format!("{:08X}", crc),
            Hasher::Sha256(hasher) => format!("{:X}", hasher.finalize()),
            Hasher::Xxh32(hasher) => format!("{:08X}", hasher.digest()),
        }
    }
}

#[cfg(test)]
pub fn digest_bytes(algorithm: DigestAlgorithm, bytes: &[u8]) -> String {
    let mut hasher = Hasher::new(algorithm);
    hasher.update(bytes);
    hasher.finish_hex()
}

/// Digest settings chosen once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigestOptions {
    pub algorithm: DigestAlgorithm,
    /// Read buffer size in bytes.
    pub buffer_size: usize,
}

impl Default for DigestOptions {
    fn default() -> Self {
        DigestOptions {
            algorithm: DigestAlgorithm::default(),
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

pub struct FileDigest {
    /// Upper-case hex encoded.
    pub digest: String,
    /// File size in bytes, as observed after reading.
    pub size: u64,
}

/// Computes file digests with a single algorithm and a reusable read buffer.
pub struct Digester {
    algorithm: DigestAlgorithm,
    buffer: Vec<u8>,
}

impl Digester {
    pub fn new(algorithm: DigestAlgorithm, buffer_size: usize) -> Self {
        Digester {
            algorithm,
            buffer: vec![0u8; buffer_size.max(1)],
        }
    }

    pub fn from_options(options: &DigestOptions) -> Self {
        Digester::new(options.algorithm, options.buffer_size)
    }

    /// Computes the digest of a file with concurrent modification detection.
    ///
    /// The file is opened read-only (other readers are not locked out), read
    /// sequentially to the end and closed before returning.
    ///
    /// # Errors
    /// - `DigestError::Io`: File doesn't exist or other I/O errors
    /// - `DigestError::PermissionDenied`: Insufficient permissions to read the file
    /// - `DigestError::ConcurrentModification`: The modification time changed while
    ///   reading. The absence of this error is *not* a guarantee that the file was
    ///   not modified.
    pub fn digest_file(&mut self, path: &Path) -> Result<FileDigest, DigestError> {
        let metadata_before = std::fs::metadata(path).map_err(|e| map_io_error(e, path))?;
        let mtime_before = metadata_before.modified().map_err(DigestError::Io)?;

        let mut hasher = Hasher::new(self.algorithm);
        {
            let mut file = File::open(path).map_err(|e| map_io_error(e, path))?;

            loop {
                let bytes_read = file
                    .read(&mut self.buffer)
                    .map_err(|e| map_io_error(e, path))?;
                if bytes_read == 0 {
                    break;
                }
                hasher.update(&self.buffer[..bytes_read]);
            }
        }

        let metadata_after = std::fs::metadata(path).map_err(DigestError::Io)?;
        let mtime_after = metadata_after.modified().map_err(DigestError::Io)?;

        if mtime_before != mtime_after {
            return Err(DigestError::ConcurrentModification(path.to_path_buf()));
        }

        let digest = hasher.finish_hex();

        debug!("Checksum of {} is {}", path.display(), digest);

        Ok(FileDigest {
            digest,
            size: metadata_after.len(),
        })
    }
}

fn map_io_error(e: std::io::Error, path: &Path) -> DigestError {
    if e.kind() == std::io::ErrorKind::PermissionDenied {
        DigestError::PermissionDenied(path.to_path_buf())
    } else {
        DigestError::Io(e)
    }
}
