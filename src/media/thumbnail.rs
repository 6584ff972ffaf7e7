use std::io::Cursor;

use image::{DynamicImage, GenericImageView, ImageFormat};

use crate::error::{Error, Result};

/// Thumbnails fit within a THUMBNAIL_SIZE x THUMBNAIL_SIZE box.
pub const THUMBNAIL_SIZE: u32 = 150;

const SHARPEN_SIGMA: f32 = 1.0;
const SHARPEN_THRESHOLD: i32 = 2;

const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

pub struct DecodedImage {
    pub format: ImageFormat,
    image: DynamicImage,
}

#[cfg(test)]
impl DecodedImage {
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

pub struct Thumbnail {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
}

/// Sniffs the format from the content and decodes the full image.
pub fn decode(bytes: &[u8]) -> Result<DecodedImage> {
    let format =
        image::guess_format(bytes).map_err(|_| Error::InvalidImage(INVALID_IMAGE.to_string()))?;
    let image = image::load_from_memory_with_format(bytes, format)
        .map_err(|_| Error::InvalidImage(INVALID_IMAGE.to_string()))?;
    Ok(DecodedImage { format, image })
}

/// Downscales (never upscales) and sharpens. JPEG sources produce JPEG
/// thumbnails, everything else is written as PNG.
pub fn render(source: &DecodedImage) -> Result<Thumbnail> {
    let (width, height) = source.image.dimensions();
    let resized = if width > THUMBNAIL_SIZE || height > THUMBNAIL_SIZE {
        source.image.thumbnail(THUMBNAIL_SIZE, THUMBNAIL_SIZE)
    } else {
        source.image.clone()
    };
    let sharpened = resized.unsharpen(SHARPEN_SIGMA, SHARPEN_THRESHOLD);

    let (format, output) = match source.format {
        ImageFormat::Jpeg => (
            ImageFormat::Jpeg,
            DynamicImage::ImageRgb8(sharpened.to_rgb8()),
        ),
        _ => (ImageFormat::Png, sharpened),
    };

    let mut buf = Cursor::new(Vec::new());
    output.write_to(&mut buf, format)?;

    Ok(Thumbnail {
        bytes: buf.into_inner(),
        format,
    })
}

/// Canonical file extension for a format.
#[must_use]
pub fn extension(format: ImageFormat) -> &'static str {
    format.extensions_str().first().copied().unwrap_or("img")
}
