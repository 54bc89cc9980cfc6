//! Checksum generation and verification over a completed download.
//!
//! Grounded on the teacher's chunked-read hashing shape (`crane-core/src/
//! hash/mod.rs`: open the file, read 64KB at a time so the whole file is
//! never loaded into memory, update a `Digest` impl per chunk), expanded from
//! the teacher's two algorithms to the full set the original tool supports
//! (`efdl::Util::stringToHashAlg`'s algorithm names).

use std::path::Path;

use digest::Digest;
use tokio::io::AsyncReadExt;

use crate::types::{EngineError, Result};

const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Md4,
    Md5,
    Sha1,
    Sha2_224,
    Sha2_256,
    Sha2_384,
    Sha2_512,
    Sha3_224,
    Sha3_256,
    Sha3_384,
    Sha3_512,
}

impl HashAlgorithm {
    /// Parse the CLI-facing algorithm name (e.g. `--gen-checksum sha2-256`).
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name.to_ascii_lowercase().as_str() {
            "md4" => Self::Md4,
            "md5" => Self::Md5,
            "sha1" => Self::Sha1,
            "sha2-224" => Self::Sha2_224,
            "sha2-256" => Self::Sha2_256,
            "sha2-384" => Self::Sha2_384,
            "sha2-512" => Self::Sha2_512,
            "sha3-224" => Self::Sha3_224,
            "sha3-256" => Self::Sha3_256,
            "sha3-384" => Self::Sha3_384,
            "sha3-512" => Self::Sha3_512,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Md4 => "md4",
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha2_224 => "sha2-224",
            Self::Sha2_256 => "sha2-256",
            Self::Sha2_384 => "sha2-384",
            Self::Sha2_512 => "sha2-512",
            Self::Sha3_224 => "sha3-224",
            Self::Sha3_256 => "sha3-256",
            Self::Sha3_384 => "sha3-384",
            Self::Sha3_512 => "sha3-512",
        }
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hash `path` with `algorithm`, streaming it in fixed-size chunks, and
/// return the lowercase hex digest.
pub async fn compute_hash(path: &Path, algorithm: HashAlgorithm) -> Result<String> {
    let mut file = tokio::fs::File::open(path).await.map_err(EngineError::Io)?;
    let mut buf = vec![0u8; CHUNK_SIZE];

    macro_rules! digest_with {
        ($hasher_ty:ty) => {{
            let mut hasher = <$hasher_ty>::new();
            loop {
                let n = file.read(&mut buf).await.map_err(EngineError::Io)?;
                if n == 0 {
                    break;
                }
                hasher.update(&buf[..n]);
            }
            format!("{:x}", hasher.finalize())
        }};
    }

    let hex = match algorithm {
        HashAlgorithm::Md4 => digest_with!(md4::Md4),
        HashAlgorithm::Md5 => digest_with!(md5::Md5),
        HashAlgorithm::Sha1 => digest_with!(sha1::Sha1),
        HashAlgorithm::Sha2_224 => digest_with!(sha2::Sha224),
        HashAlgorithm::Sha2_256 => digest_with!(sha2::Sha256),
        HashAlgorithm::Sha2_384 => digest_with!(sha2::Sha384),
        HashAlgorithm::Sha2_512 => digest_with!(sha2::Sha512),
        HashAlgorithm::Sha3_224 => digest_with!(sha3::Sha3_224),
        HashAlgorithm::Sha3_256 => digest_with!(sha3::Sha3_256),
        HashAlgorithm::Sha3_384 => digest_with!(sha3::Sha3_384),
        HashAlgorithm::Sha3_512 => digest_with!(sha3::Sha3_512),
    };

    Ok(hex)
}

/// Compute `algorithm`'s digest of `path` and compare it case-insensitively
/// against `expected_hex`.
pub async fn verify(path: &Path, algorithm: HashAlgorithm, expected_hex: &str) -> Result<bool> {
    let actual = compute_hash(path, algorithm).await?;
    Ok(actual.eq_ignore_ascii_case(expected_hex.trim()))
}
