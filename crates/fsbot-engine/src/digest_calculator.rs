//! Single-pass multi-algorithm file digests.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;
use sha2::{Digest, Sha256, Sha512};

use crate::engine_error::{EngineError, EngineResult};

const CHUNK_SIZE: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    Md5,
    Sha256,
    Sha512,
}

impl DigestAlgorithm {
    pub const DEFAULT_SET: [DigestAlgorithm; 2] = [DigestAlgorithm::Md5, DigestAlgorithm::Sha256];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }
}

impl FromStr for DigestAlgorithm {
    type Err = EngineError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().replace('-', "").as_str() {
            "md5" => Ok(Self::Md5),
            "sha256" => Ok(Self::Sha256),
            "sha512" => Ok(Self::Sha512),
            _ => Err(EngineError::InvalidArgument(format!(
                "unsupported digest algorithm '{raw}' (expected md5, sha256 or sha512)"
            ))),
        }
    }
}

enum HashState {
    Md5(md5::Context),
    Sha256(Sha256),
    Sha512(Sha512),
}

impl HashState {
    fn new(algorithm: DigestAlgorithm) -> Self {
        match algorithm {
            DigestAlgorithm::Md5 => Self::Md5(md5::Context::new()),
            DigestAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
            DigestAlgorithm::Sha512 => Self::Sha512(Sha512::new()),
        }
    }

    fn update(&mut self, chunk: &[u8]) {
        match self {
            Self::Md5(context) => context.consume(chunk),
            Self::Sha256(hasher) => hasher.update(chunk),
            Self::Sha512(hasher) => hasher.update(chunk),
        }
    }

    fn finish_hex(self) -> String {
        match self {
            Self::Md5(context) => format!("{:x}", context.compute()),
            Self::Sha256(hasher) => format!("{:x}", hasher.finalize()),
            Self::Sha512(hasher) => format!("{:x}", hasher.finalize()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DigestResult {
    pub path: PathBuf,
    pub bytes_read: u64,
    /// Lowercase hex digest per algorithm.
    pub digests: BTreeMap<DigestAlgorithm, String>,
}

impl DigestResult {
    pub fn hex(&self, algorithm: DigestAlgorithm) -> Option<&str> {
        self.digests.get(&algorithm).map(String::as_str)
    }
}

/// Streams `path` once in fixed-size chunks, feeding every requested
/// algorithm per chunk.
pub fn digest_file(path: &Path, algorithms: &[DigestAlgorithm]) -> EngineResult<DigestResult> {
    let metadata = std::fs::metadata(path).map_err(|error| EngineError::from_io(error, path))?;
    if !metadata.is_file() {
        return Err(EngineError::NotAFile(path.display().to_string()));
    }
    if algorithms.is_empty() {
        return Err(EngineError::InvalidArgument(
            "at least one digest algorithm is required".to_string(),
        ));
    }

    let mut states: Vec<(DigestAlgorithm, HashState)> = Vec::with_capacity(algorithms.len());
    for algorithm in algorithms {
        if !states.iter().any(|(existing, _)| existing == algorithm) {
            states.push((*algorithm, HashState::new(*algorithm)));
        }
    }

    let mut file = File::open(path).map_err(|error| EngineError::from_io(error, path))?;
    let mut buffer = [0u8; CHUNK_SIZE];
    let mut bytes_read = 0u64;
    loop {
        let read = file
            .read(&mut buffer)
            .map_err(|error| EngineError::from_io(error, path))?;
        if read == 0 {
            break;
        }
        for (_, state) in &mut states {
            state.update(&buffer[..read]);
        }
        bytes_read += read as u64;
    }

    Ok(DigestResult {
        path: path.to_path_buf(),
        bytes_read,
        digests: states
            .into_iter()
            .map(|(algorithm, state)| (algorithm, state.finish_hex()))
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn functional_known_vectors_for_abc() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("abc.txt");
        std::fs::write(&path, "abc").expect("write");

        let result = digest_file(
            &path,
            &[DigestAlgorithm::Md5, DigestAlgorithm::Sha256, DigestAlgorithm::Sha512],
        )
        .expect("digest");
        assert_eq!(result.bytes_read, 3);
        assert_eq!(
            result.hex(DigestAlgorithm::Md5),
            Some("900150983cd24fb0d6963f7d28e17f72")
        );
        assert_eq!(
            result.hex(DigestAlgorithm::Sha256),
            Some("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
        assert!(result
            .hex(DigestAlgorithm::Sha512)
            .is_some_and(|hex| hex.starts_with("ddaf35a193617aba")));
    }

    #[test]
    fn functional_digest_is_deterministic_and_content_sensitive() {
        let temp = tempfile::tempdir().expect("tempdir");
        let original = temp.path().join("data.bin");
        let copy = temp.path().join("copy.bin");
        let modified = temp.path().join("modified.bin");
        let payload: Vec<u8> = (0..(CHUNK_SIZE * 3 + 17)).map(|i| (i % 251) as u8).collect();
        std::fs::write(&original, &payload).expect("write");
        std::fs::write(&copy, &payload).expect("write");
        let mut changed = payload.clone();
        changed[CHUNK_SIZE + 1] ^= 0xff;
        std::fs::write(&modified, &changed).expect("write");

        let first = digest_file(&original, &DigestAlgorithm::DEFAULT_SET).expect("digest");
        let second = digest_file(&copy, &DigestAlgorithm::DEFAULT_SET).expect("digest");
        let third = digest_file(&modified, &DigestAlgorithm::DEFAULT_SET).expect("digest");
        assert_eq!(first.digests, second.digests);
        assert_ne!(
            first.hex(DigestAlgorithm::Md5),
            third.hex(DigestAlgorithm::Md5)
        );
        assert_ne!(
            first.hex(DigestAlgorithm::Sha256),
            third.hex(DigestAlgorithm::Sha256)
        );
        assert_eq!(first.bytes_read, payload.len() as u64);
    }

    #[test]
    fn regression_directories_and_missing_paths_are_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(matches!(
            digest_file(temp.path(), &DigestAlgorithm::DEFAULT_SET),
            Err(EngineError::NotAFile(_))
        ));
        assert!(matches!(
            digest_file(&temp.path().join("nope"), &DigestAlgorithm::DEFAULT_SET),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn unit_algorithm_names_parse_case_insensitively() {
        assert_eq!("MD5".parse::<DigestAlgorithm>().ok(), Some(DigestAlgorithm::Md5));
        assert_eq!(
            "SHA-256".parse::<DigestAlgorithm>().ok(),
            Some(DigestAlgorithm::Sha256)
        );
        assert!("crc32".parse::<DigestAlgorithm>().is_err());
    }
}
