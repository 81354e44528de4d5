//! Media file helpers shared by providers.

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::LlmError;

/// Guess a MIME type from the file extension.
///
/// Falls back to `application/octet-stream` for unknown extensions, matching
/// how providers treat opaque uploads.
pub fn guess_mime(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or("application/octet-stream")
        .to_string()
}

/// Whether a MIME type names an image.
pub fn is_image(mime_type: &str) -> bool {
    mime_type.starts_with("image/")
}

/// Read a media file into memory.
pub async fn read_bytes(path: &Path) -> Result<Vec<u8>, LlmError> {
    tokio::fs::read(path).await.map_err(|e| LlmError::MediaRead {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Read a media file and base64-encode it for inline transport.
pub async fn read_base64(path: &Path) -> Result<String, LlmError> {
    let bytes = read_bytes(path).await?;
    Ok(STANDARD.encode(bytes))
}

/// File name for upload metadata, with a fallback for pathological paths.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string())
}
