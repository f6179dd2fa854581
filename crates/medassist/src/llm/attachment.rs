//! Image attachments for multimodal requests.

use std::io::Cursor;
use std::path::Path;

use base64::prelude::*;
use image::{DynamicImage, ImageFormat};
use thiserror::Error;

/// A single image bound to the most recent user turn of one request.
///
/// The image is normalized to JPEG on construction so both providers see the
/// same bytes regardless of the uploaded format.
#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    jpeg: Vec<u8>,
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("mime_type", &self.mime_type())
            .field("bytes", &self.jpeg.len())
            .finish()
    }
}

impl Attachment {
    /// Re-encode an already decoded image as JPEG. Alpha is dropped.
    pub fn from_image(image: &DynamicImage) -> Result<Self, AttachmentError> {
        let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
        let mut buf = Cursor::new(Vec::new());
        rgb.write_to(&mut buf, ImageFormat::Jpeg)?;
        Ok(Self {
            jpeg: buf.into_inner(),
        })
    }

    /// Decode an uploaded image (PNG or JPEG) and normalize it.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AttachmentError> {
        let image = image::load_from_memory(bytes)?;
        Self::from_image(&image)
    }

    /// Read and normalize an image file.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, AttachmentError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| AttachmentError::Io {
                path: path.display().to_string(),
                source,
            })?;
        Self::from_bytes(&bytes)
    }

    pub fn mime_type(&self) -> &'static str {
        "image/jpeg"
    }

    pub fn bytes(&self) -> &[u8] {
        &self.jpeg
    }

    pub fn to_base64(&self) -> String {
        BASE64_STANDARD.encode(&self.jpeg)
    }

    /// `data:` URI form used by OpenAI-style image parts.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type(), self.to_base64())
    }
}

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("failed to read image {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("unsupported or corrupt image: {0}")]
    Image(#[from] image::ImageError),
}
