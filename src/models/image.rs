//! Scan Images
//!
//! An uploaded scan image ready for the inference boundary. The format is
//! sniffed from the bytes rather than trusted from the file extension.

use std::fmt;
use std::path::Path;

use base64::Engine;
use image::ImageFormat;

use scan_review_core::ImageRef;

use crate::utils::error::{AppError, AppResult};

/// Maximum file size accepted for a single image (20MB)
const MAX_IMAGE_SIZE: u64 = 20 * 1024 * 1024;

/// One image of a scan series, in upload order.
#[derive(Clone)]
pub struct ScanImage {
    pub id: String,
    /// Sequence label sent to the model, e.g. `Image 2`
    pub label: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ScanImage {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Build the image at 1-based `position`, sniffing its format.
    pub fn from_bytes(position: usize, bytes: Vec<u8>) -> AppResult<Self> {
        let mime_type = sniff_mime_type(&bytes)?;
        Ok(Self::new(
            uuid::Uuid::new_v4().to_string(),
            sequence_label(position),
            mime_type,
            bytes,
        ))
    }

    /// Read an image file from disk.
    pub fn from_path(path: &Path, position: usize) -> AppResult<Self> {
        let size = std::fs::metadata(path)?.len();
        if size > MAX_IMAGE_SIZE {
            return Err(AppError::validation(format!(
                "{} is too large ({} bytes, max {})",
                path.display(),
                size,
                MAX_IMAGE_SIZE
            )));
        }
        let bytes = std::fs::read(path)?;
        Self::from_bytes(position, bytes).map_err(|e| match e {
            AppError::Validation(msg) => {
                AppError::validation(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    /// Load a series of files, labelling them in the given order.
    pub fn load_series<P: AsRef<Path>>(paths: &[P]) -> AppResult<Vec<Self>> {
        paths
            .iter()
            .enumerate()
            .map(|(index, path)| Self::from_path(path.as_ref(), index + 1))
            .collect()
    }

    /// Standard base64 payload for the inference boundary
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }

    /// The persisted reference kept on the case after analysis
    pub fn image_ref(&self) -> ImageRef {
        ImageRef {
            id: self.id.clone(),
            label: self.label.clone(),
            mime_type: self.mime_type.clone(),
        }
    }
}

impl fmt::Debug for ScanImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanImage")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// `Image N` for a 1-based position
pub fn sequence_label(position: usize) -> String {
    format!("Image {}", position)
}

/// Detect the MIME type of an image from its magic bytes.
pub fn sniff_mime_type(bytes: &[u8]) -> AppResult<&'static str> {
    if bytes.is_empty() {
        return Err(AppError::validation("Image is empty"));
    }
    let format = image::guess_format(bytes)
        .map_err(|_| AppError::validation("Unrecognised image format"))?;
    match format {
        ImageFormat::Png => Ok("image/png"),
        ImageFormat::Jpeg => Ok("image/jpeg"),
        ImageFormat::Gif => Ok("image/gif"),
        ImageFormat::WebP => Ok("image/webp"),
        other => Err(AppError::validation(format!(
            "Unsupported image format: {:?}",
            other
        ))),
    }
}
