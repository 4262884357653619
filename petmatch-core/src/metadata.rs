use image::ImageReader;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Failed to read image: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("Image data is empty")]
    Empty,
}

/// Dimensions and channel count reported for an uploaded image.
/// Missing or zero values are defaulted later by the feature extractor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub channels: Option<u8>,
}

impl ImageMetadata {
    pub fn new(width: u32, height: u32, channels: u8) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            channels: Some(channels),
        }
    }
}

/// Source of image metadata for raw upload bytes
pub trait MetadataProvider {
    fn read_metadata(&self, bytes: &[u8]) -> Result<ImageMetadata, MetadataError>;
}

/// Metadata provider that decodes the image with the `image` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct DecodingMetadataProvider;

impl DecodingMetadataProvider {
    pub fn new() -> Self {
        Self
    }

    /// Read metadata for an image file on disk
    pub fn read_metadata_from_path<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> Result<ImageMetadata, MetadataError> {
        let bytes = fs::read(path)?;
        self.read_metadata(&bytes)
    }
}

impl MetadataProvider for DecodingMetadataProvider {
    fn read_metadata(&self, bytes: &[u8]) -> Result<ImageMetadata, MetadataError> {
        if bytes.is_empty() {
            return Err(MetadataError::Empty);
        }

        let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
        let format = reader.format();
        let image = reader
            .decode()
            .map_err(|e| MetadataError::Decode(e.to_string()))?;

        let metadata = ImageMetadata::new(
            image.width(),
            image.height(),
            image.color().channel_count(),
        );
        log::debug!(
            "Decoded {:?} image: {}x{}, {} channels",
            format,
            image.width(),
            image.height(),
            image.color().channel_count()
        );

        Ok(metadata)
    }
}
