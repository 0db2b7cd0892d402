use std::io::Cursor;
use std::path::Path;

use image::{ImageFormat, ImageReader};

use super::ImageError;

pub const ALLOWED_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/webp", "image/gif"];

// Leading bytes of each accepted container. WebP is handled separately because its
// marker sits at offset 8 behind the RIFF header.
const SIGNATURES: [(&[u8], &str); 4] = [
    (b"\xFF\xD8\xFF", "image/jpeg"),
    (b"\x89PNG\r\n\x1a\n", "image/png"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
];

pub fn is_allowed(mime_type: &str) -> bool {
    ALLOWED_TYPES.contains(&mime_type)
}

/// Rejects empty buffers and buffers above `max_size` bytes.
pub fn check_size(len: usize, max_size: usize) -> Result<(), ImageError> {
    if len == 0 {
        return Err(ImageError::Empty);
    }
    if len > max_size {
        return Err(ImageError::TooLarge {
            max_mb: max_size / (1024 * 1024),
        });
    }
    Ok(())
}

/// Classifies `data` as one of [`ALLOWED_TYPES`] regardless of what `filename` claims.
///
/// Tries, in order: content sniffing, the raw signature table, and finally a full decode
/// in the format implied by the file extension.
pub fn validate_image_content(data: &[u8], filename: &str) -> Result<&'static str, ImageError> {
    if let Some(mime_type) = sniff(data)? {
        return Ok(mime_type);
    }

    if let Some(mime_type) = match_signature(data) {
        return Ok(mime_type);
    }

    if let Some(mime_type) = decode_with_extension(data, filename) {
        return Ok(mime_type);
    }

    tracing::debug!(filename = %filename, size = data.len(), "Rejected upload: no image signature");
    Err(ImageError::Unsupported)
}

fn sniff(data: &[u8]) -> Result<Option<&'static str>, ImageError> {
    match image::guess_format(data) {
        Ok(format) => {
            let mime_type = format.to_mime_type();
            if is_allowed(mime_type) {
                Ok(Some(mime_type))
            } else {
                Err(ImageError::DisallowedType(mime_type.to_string()))
            }
        }
        Err(e) => {
            tracing::debug!(error = %e, "Content sniffing inconclusive, falling back to signatures");
            Ok(None)
        }
    }
}

pub fn match_signature(data: &[u8]) -> Option<&'static str> {
    if let Some((_, mime_type)) = SIGNATURES
        .iter()
        .find(|(signature, _)| data.starts_with(signature))
    {
        return Some(mime_type);
    }

    if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        return Some("image/webp");
    }

    None
}

fn decode_with_extension(data: &[u8], filename: &str) -> Option<&'static str> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let format = match extension.as_str() {
        "png" => ImageFormat::Png,
        "webp" => ImageFormat::WebP,
        "gif" => ImageFormat::Gif,
        _ => ImageFormat::Jpeg,
    };

    let mut reader = ImageReader::new(Cursor::new(data));
    reader.set_format(format);
    match reader.decode() {
        Ok(_) => Some(format.to_mime_type()),
        Err(e) => {
            tracing::debug!(filename = %filename, error = %e, "Extension-based decode failed");
            None
        }
    }
}
