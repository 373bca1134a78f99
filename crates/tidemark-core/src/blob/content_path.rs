//! Deterministic remote path derivation for attachments.

use sha2::{Digest, Sha256};

use crate::models::OwnerId;

/// Number of digest hex characters kept in a remote path.
const DIGEST_LEN: usize = 12;

/// The identity of a local file as seen by content addressing.
///
/// The digest covers size, modification time, and name rather than file
/// bytes, so an unchanged file never has to be re-read to decide whether
/// it was already uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileIdentity {
    /// Original file name, before sanitization.
    pub name: String,
    /// File size in bytes.
    pub size: u64,
    /// Modification time (Unix ms).
    pub mtime_ms: i64,
}

impl FileIdentity {
    fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("{}:{}:{}", self.size, self.mtime_ms, self.name));
        let digest = hasher.finalize();
        let hex: String = digest.iter().map(|byte| format!("{byte:02x}")).collect();
        hex[..DIGEST_LEN].to_string()
    }
}

/// Derive the remote object path for a file: `{owner}/{digest}_{name}`.
///
/// The same owner and file identity always yield the same path, which is
/// what makes deduplication a pure key comparison on the remote side.
#[must_use]
pub fn derive_remote_path(owner: &OwnerId, identity: &FileIdentity) -> String {
    format!(
        "{}/{}_{}",
        owner.as_str(),
        identity.digest(),
        sanitize_file_name(&identity.name)
    )
}

/// Strip path separators and characters unsafe in object keys.
///
/// Keeps ASCII alphanumerics plus `.`, `_`, and `-`; anything else is
/// dropped. An empty result falls back to `file`.
#[must_use]
pub fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name)
        .trim();

    let sanitized: String = base
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-'))
        .collect();

    if sanitized.is_empty() {
        "file".to_string()
    } else {
        sanitized
    }
}
