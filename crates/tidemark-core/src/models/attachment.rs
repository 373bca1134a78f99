//! Attachment reference model

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A reference to a binary attachment embedded in an entity's payload.
///
/// Created with only a local locator when a file is first attached; gains a
/// remote locator once uploaded. The local locator may later be dropped when
/// local storage is reclaimed and re-hydrated on demand, so both sides are
/// optional — a valid reference carries at least one of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    /// Local locator: filesystem path or `file://` URI.
    #[serde(default)]
    pub uri: Option<String>,
    /// Content-derived remote path, set after upload.
    #[serde(default)]
    pub remote_path: Option<String>,
}

impl AttachmentRef {
    /// Reference a freshly attached local file that has not been uploaded.
    #[must_use]
    pub fn local(uri: impl Into<String>) -> Self {
        Self {
            uri: Some(uri.into()),
            remote_path: None,
        }
    }

    /// Whether this attachment already has a remote locator.
    #[must_use]
    pub const fn is_uploaded(&self) -> bool {
        self.remote_path.is_some()
    }

    /// Resolve the local locator to a filesystem path, stripping a `file://`
    /// scheme when present.
    #[must_use]
    pub fn local_file_path(&self) -> Option<PathBuf> {
        let uri = self.uri.as_deref()?;
        let path = uri.strip_prefix("file://").unwrap_or(uri);
        if path.is_empty() {
            None
        } else {
            Some(PathBuf::from(path))
        }
    }
}
