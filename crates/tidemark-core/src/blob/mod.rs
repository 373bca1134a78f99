//! Content-addressed blob storage
//!
//! Attachments are uploaded once per content under a deterministic
//! owner-scoped path, recompressed when they are large images, and cached
//! locally after download so each object crosses the network at most once
//! in each direction.

mod content_path;
mod object_store;
mod recompress;
mod transfer;

pub use content_path::{derive_remote_path, sanitize_file_name, FileIdentity};
pub use object_store::{BlobStore, R2BlobStore, R2Config};
pub use recompress::{is_image_name, prepare_for_upload};
pub use transfer::BlobTransferService;
