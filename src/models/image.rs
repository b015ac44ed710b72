//! Submitted images.

use std::path::Path;

use base64::Engine;
use sha2::{Digest, Sha256};

/// An image submitted for analysis.
///
/// Images are assumed to be validated (size, dimensions, MIME) before they
/// reach the analyzer. They live only for the duration of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInput {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl ImageInput {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }

    /// Build an image from base64 content (as posted by upload clients).
    ///
    /// Accepts a bare payload or a `data:<mime>;base64,` URL.
    pub fn from_base64(
        filename: impl Into<String>,
        data: &str,
    ) -> Result<Self, base64::DecodeError> {
        let payload = match data.split_once(";base64,") {
            Some((prefix, rest)) if prefix.starts_with("data:") => rest,
            _ => data,
        };
        let bytes = base64::engine::general_purpose::STANDARD.decode(payload.trim())?;
        Ok(Self::new(filename, bytes))
    }

    /// Read an image from disk, using the file name as the image name.
    pub async fn read(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(filename, bytes))
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// MIME type sniffed from content, defaulting to JPEG.
    pub fn mime_type(&self) -> &'static str {
        infer::get(&self.bytes)
            .map(|kind| kind.mime_type())
            .filter(|mime| mime.starts_with("image/"))
            .unwrap_or("image/jpeg")
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }

    /// `data:` URL for OpenAI-style image content parts.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type(), self.to_base64())
    }

    /// SHA-256 of the image bytes, hex encoded.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.bytes);
        hex::encode(hasher.finalize())
    }
}
