//! Artifact-cache collaborator contract and a directory-backed implementation.
//!
//! Artifacts are stored content-addressed by fingerprint. Each stored file
//! carries a binary header with magic bytes, a format version, and a payload
//! checksum; reads validate all three and treat any problem as a cache miss.

use mason_common::ContentHash;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::CacheError;
use crate::fingerprint::Fingerprint;

/// Magic bytes identifying a Mason cache artifact.
const ARTIFACT_MAGIC: [u8; 4] = *b"MSON";

/// Current artifact format version. Increment on breaking changes to
/// the header or payload format.
const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// File extension for stored artifacts.
const ARTIFACT_EXT: &str = "bin";

/// The artifact-cache collaborator consumed by the validity oracle.
///
/// Both probes are pure lookups that never mutate cache state. I/O failures
/// while probing must surface as `false`/`None` (a conservative miss forcing
/// a rebuild), never as errors: correctness favors unnecessary rebuilds over
/// false cache hits.
pub trait ArtifactCache {
    /// Returns `true` iff a valid artifact exists for the fingerprint.
    fn has_artifact(&self, fingerprint: &Fingerprint) -> bool;

    /// Fetches the artifact payload for the fingerprint, or `None` on miss.
    fn fetch_artifact(&self, fingerprint: &Fingerprint) -> Option<Vec<u8>>;
}

/// Header prepended to every stored artifact for validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ArtifactHeader {
    /// Magic bytes: must be `b"MSON"`.
    magic: [u8; 4],

    /// Artifact format version.
    format_version: u32,

    /// Content hash of the payload data, for corruption detection.
    checksum: ContentHash,
}

/// A content-addressed artifact store in a local directory.
///
/// Each artifact lives at `<root>/<fingerprint-hex>.bin`. Only idempotent
/// fingerprints can address artifacts; storing under a non-idempotent one
/// is rejected.
pub struct DirArtifactCache {
    /// Root directory for stored artifacts.
    root: PathBuf,
}

impl DirArtifactCache {
    /// Creates a store rooted at the given directory.
    ///
    /// The directory is created lazily on the first store.
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// Returns the file path for an artifact with the given hex key.
    fn artifact_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.{ARTIFACT_EXT}"))
    }

    /// Writes an artifact keyed by the given fingerprint and returns the key.
    ///
    /// Fails with [`CacheError::UncacheableKey`] for non-idempotent
    /// fingerprints: their outputs must never be reused.
    pub fn store(&self, fingerprint: &Fingerprint, data: &[u8]) -> Result<String, CacheError> {
        let key = fingerprint.cache_key().ok_or(CacheError::UncacheableKey)?;

        std::fs::create_dir_all(&self.root).map_err(|e| CacheError::Io {
            path: self.root.clone(),
            source: e,
        })?;

        let header = ArtifactHeader {
            magic: ARTIFACT_MAGIC,
            format_version: ARTIFACT_FORMAT_VERSION,
            checksum: ContentHash::from_bytes(data),
        };
        let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard())
            .map_err(|e| CacheError::Serialization {
                reason: e.to_string(),
            })?;

        // Layout: 4-byte header length (little-endian) + header + payload.
        let header_len = header_bytes.len() as u32;
        let mut output = Vec::with_capacity(4 + header_bytes.len() + data.len());
        output.extend_from_slice(&header_len.to_le_bytes());
        output.extend_from_slice(&header_bytes);
        output.extend_from_slice(data);

        let path = self.artifact_path(&key);
        std::fs::write(&path, &output).map_err(|e| CacheError::Io { path, source: e })?;

        Ok(key)
    }

    /// Reads and validates the artifact for the given hex key.
    ///
    /// Returns `None` if the file is missing, the header is invalid, the
    /// format version doesn't match, or the checksum doesn't verify.
    fn read_validated(&self, key: &str) -> Option<Vec<u8>> {
        let path = self.artifact_path(key);
        let raw = std::fs::read(&path).ok()?;

        if raw.len() < 4 {
            return None;
        }
        let header_len = u32::from_le_bytes(raw[..4].try_into().ok()?) as usize;
        if raw.len() < 4 + header_len {
            return None;
        }

        let header: ArtifactHeader =
            bincode::serde::decode_from_slice(&raw[4..4 + header_len], bincode::config::standard())
                .ok()?
                .0;

        if header.magic != ARTIFACT_MAGIC {
            return None;
        }
        if header.format_version != ARTIFACT_FORMAT_VERSION {
            return None;
        }

        let payload = &raw[4 + header_len..];
        if ContentHash::from_bytes(payload) != header.checksum {
            return None;
        }

        Some(payload.to_vec())
    }
}

impl ArtifactCache for DirArtifactCache {
    fn has_artifact(&self, fingerprint: &Fingerprint) -> bool {
        self.fetch_artifact(fingerprint).is_some()
    }

    fn fetch_artifact(&self, fingerprint: &Fingerprint) -> Option<Vec<u8>> {
        let key = fingerprint.cache_key()?;
        self.read_validated(&key)
    }
}
