use std::io::Cursor;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use image::{DynamicImage, ImageFormat, RgbImage, RgbaImage};

use super::block::Rgba;

pub fn image_format_from_mime(mime: &str) -> Option<ImageFormat> {
    match mime {
        "image/png" => Some(ImageFormat::Png),
        "image/jpeg" => Some(ImageFormat::Jpeg),
        "image/jpg" => Some(ImageFormat::Jpeg),
        "image/gif" => Some(ImageFormat::Gif),
        "image/webp" => Some(ImageFormat::WebP),
        "image/bmp" => Some(ImageFormat::Bmp),
        "image/tiff" => Some(ImageFormat::Tiff),
        _ => None,
    }
}

pub fn image_format_from_path(path: &Path) -> Option<ImageFormat> {
    let format = ImageFormat::from_path(path).ok()?;
    match format {
        ImageFormat::Png
        | ImageFormat::Jpeg
        | ImageFormat::Gif
        | ImageFormat::WebP
        | ImageFormat::Bmp
        | ImageFormat::Tiff => Some(format),
        _ => None,
    }
}

/// Formats written without an alpha channel.
pub fn is_opaque_format(format: ImageFormat) -> bool {
    matches!(format, ImageFormat::Jpeg | ImageFormat::Bmp)
}

/// Blends every pixel over an opaque `background`.
pub fn flatten(image: &RgbaImage, background: Rgba) -> RgbImage {
    let [br, bg, bb, _] = background.0;
    let mut out = RgbImage::new(image.width(), image.height());
    for (dst, src) in out.pixels_mut().zip(image.pixels()) {
        let [r, g, b, a] = src.0;
        let alpha = a as f32 / 255.0;
        let mix =
            |fore: u8, back: u8| (fore as f32 * alpha + back as f32 * (1.0 - alpha)).round() as u8;
        *dst = image::Rgb([mix(r, br), mix(g, bg), mix(b, bb)]);
    }
    out
}

pub fn encode_image(image: &RgbaImage, format: ImageFormat) -> Result<Vec<u8>> {
    let dynamic = if is_opaque_format(format) {
        DynamicImage::ImageRgb8(flatten(image, Rgba::WHITE))
    } else {
        DynamicImage::ImageRgba8(image.clone())
    };
    let mut bytes = Vec::new();
    let mut cursor = Cursor::new(&mut bytes);
    dynamic
        .write_to(&mut cursor, format)
        .with_context(|| format!("failed to encode image as {:?}", format))?;
    Ok(bytes)
}

pub fn encode_image_for_mime(image: &RgbaImage, mime: &str) -> Result<Vec<u8>> {
    let format = image_format_from_mime(mime)
        .ok_or_else(|| anyhow!("unsupported output image mime '{}'", mime))?;
    encode_image(image, format)
}

pub fn save_image(image: &RgbaImage, path: &Path) -> Result<()> {
    let format = image_format_from_path(path)
        .ok_or_else(|| anyhow!("unsupported output image type: {}", path.display()))?;
    let bytes = encode_image(image, format)?;
    std::fs::write(path, bytes)
        .with_context(|| format!("failed to write image: {}", path.display()))?;
    Ok(())
}
