use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, GenericImageView, ImageDecoder, ImageFormat, ImageReader, Rgb, RgbImage};
use std::io::Cursor;

use super::ImageError;
use crate::models::settings::ImageSettings;

/// Every stored image and thumbnail is re-encoded to this format.
pub const OUTPUT_MIME_TYPE: &str = "image/jpeg";

#[derive(Debug)]
pub struct ProcessedImage {
    pub main: Vec<u8>,
    pub thumbnail: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Decode, normalise and re-encode an upload that already passed validation.
///
/// `mime_type` is the validated content type; it pins the decoder so buffers accepted
/// through the extension fallback decode the same way they were validated.
pub fn process_image(
    data: &[u8],
    mime_type: &str,
    settings: &ImageSettings,
) -> Result<ProcessedImage, ImageError> {
    let mut reader = ImageReader::new(Cursor::new(data));
    match ImageFormat::from_mime_type(mime_type) {
        Some(format) => reader.set_format(format),
        None => reader = reader.with_guessed_format()?,
    }

    let mut decoder = reader
        .into_decoder()
        .map_err(|e| ImageError::Decode(e.to_string()))?;

    let (raw_width, raw_height) = decoder.dimensions();
    let (limit_width, limit_height) = settings.hard_limit();
    if raw_width > limit_width || raw_height > limit_height {
        return Err(ImageError::DimensionsTooLarge {
            max_width: limit_width,
            max_height: limit_height,
        });
    }

    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let mut img =
        DynamicImage::from_decoder(decoder).map_err(|e| ImageError::Decode(e.to_string()))?;
    img.apply_orientation(orientation);

    let normalized = DynamicImage::ImageRgb8(flatten_to_rgb(img));
    let main = fit_within(normalized, settings.max_width, settings.max_height);
    let thumbnail = make_thumbnail(&main, settings.thumbnail_size);

    let (width, height) = main.dimensions();
    tracing::debug!(
        raw_width,
        raw_height,
        width,
        height,
        orientation = ?orientation,
        "Image normalised"
    );

    Ok(ProcessedImage {
        main: encode_jpeg(&main, settings.quality)?,
        thumbnail: encode_jpeg(&thumbnail, settings.quality)?,
        width,
        height,
    })
}

/// Composite any alpha channel onto opaque white and drop to plain RGB.
pub fn flatten_to_rgb(img: DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }

    let rgba = img.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let pixel = rgba.get_pixel(x, y);
        let alpha = pixel[3] as u16;
        let blend = |c: u8| ((c as u16 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        Rgb([blend(pixel[0]), blend(pixel[1]), blend(pixel[2])])
    })
}

/// Shrink proportionally until both sides fit; smaller images are returned untouched.
pub fn fit_within(img: DynamicImage, max_width: u32, max_height: u32) -> DynamicImage {
    if img.width() > max_width || img.height() > max_height {
        img.resize(max_width, max_height, FilterType::Lanczos3)
    } else {
        img
    }
}

/// Square centre crop, then resize; always exactly `size`×`size`.
/// The crop runs before the resize, so no intermediate buffer exceeds the source.
pub fn make_thumbnail(img: &DynamicImage, size: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    let side = width.min(height);
    img.crop_imm((width - side) / 2, (height - side) / 2, side, side)
        .resize_exact(size, size, FilterType::Lanczos3)
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, ImageError> {
    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
    img.write_with_encoder(encoder)
        .map_err(|e| ImageError::Encode(e.to_string()))?;
    Ok(buffer)
}
