use serde::{Deserialize, Serialize};

pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;
pub const MAX_WIDTH: u32 = 2000;
pub const MAX_HEIGHT: u32 = 2000;
pub const THUMBNAIL_SIZE: u32 = 300;
pub const JPEG_QUALITY: u8 = 85;

/// Limits and output parameters for the image ingestion pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSettings {
    pub max_file_size: usize,
    pub max_width: u32,
    pub max_height: u32,
    pub thumbnail_size: u32,
    pub quality: u8,
}

impl ImageSettings {
    /// Raw uploads larger than this in either axis are refused outright.
    pub fn hard_limit(&self) -> (u32, u32) {
        (
            self.max_width.saturating_mul(2),
            self.max_height.saturating_mul(2),
        )
    }
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            max_file_size: MAX_FILE_SIZE,
            max_width: MAX_WIDTH,
            max_height: MAX_HEIGHT,
            thumbnail_size: THUMBNAIL_SIZE,
            quality: JPEG_QUALITY,
        }
    }
}
