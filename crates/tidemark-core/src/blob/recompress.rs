//! Image recompression applied before upload.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::GenericImageView;

use crate::error::{Error, Result};

/// Images wider than this are downscaled before upload.
const MAX_IMAGE_WIDTH: u32 = 1600;

/// JPEG quality for recompressed uploads.
const JPEG_QUALITY: u8 = 80;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp"];

/// Whether a file name looks like an image we know how to recompress.
#[must_use]
pub fn is_image_name(file_name: &str) -> bool {
    file_name
        .rsplit_once('.')
        .is_some_and(|(_, ext)| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Prepare file bytes for upload.
///
/// Images are downscaled to at most [`MAX_IMAGE_WIDTH`] pixels wide and
/// re-encoded as JPEG. Non-image files, and image files that fail to
/// decode, are uploaded as-is.
///
/// Returns the bytes to upload and the content type to store with them.
pub fn prepare_for_upload(file_name: &str, bytes: Vec<u8>) -> Result<(Vec<u8>, &'static str)> {
    if !is_image_name(file_name) {
        return Ok((bytes, "application/octet-stream"));
    }

    let Ok(source) = image::load_from_memory(&bytes) else {
        // Extension lied; treat as an opaque blob rather than failing sync.
        tracing::warn!("Could not decode image attachment {file_name}; uploading raw bytes");
        return Ok((bytes, "application/octet-stream"));
    };

    let (width, height) = source.dimensions();
    let resized = if width > MAX_IMAGE_WIDTH {
        source.thumbnail(MAX_IMAGE_WIDTH, height)
    } else {
        source
    };

    let mut cursor = Cursor::new(Vec::new());
    let mut encoder = JpegEncoder::new_with_quality(&mut cursor, JPEG_QUALITY);
    encoder
        .encode_image(&resized)
        .map_err(|error| Error::Transfer(format!("Failed to re-encode {file_name}: {error}")))?;

    Ok((cursor.into_inner(), "image/jpeg"))
}
