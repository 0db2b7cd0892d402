pub mod image_processor;
pub mod image_validator;

/// Failures of the image ingestion pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("Empty file")]
    Empty,
    #[error("File too large. Maximum size: {max_mb}MB")]
    TooLarge { max_mb: usize },
    #[error("Invalid file type: {0}")]
    DisallowedType(String),
    #[error("Invalid or unsupported image file")]
    Unsupported,
    #[error("Image dimensions too large. Max: {max_width}x{max_height}")]
    DimensionsTooLarge { max_width: u32, max_height: u32 },
    #[error("failed to decode image: {0}")]
    Decode(String),
    #[error("failed to encode image: {0}")]
    Encode(String),
    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),
}

impl ImageError {
    /// Rejections caused by the uploaded content itself rather than by the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ImageError::Empty
                | ImageError::TooLarge { .. }
                | ImageError::DisallowedType(_)
                | ImageError::Unsupported
                | ImageError::DimensionsTooLarge { .. }
        )
    }
}
