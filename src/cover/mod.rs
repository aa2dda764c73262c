//! Cover thumbnails and the `data:` URLs the library grid displays.

use base64::{engine::general_purpose::STANDARD, Engine};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, ImageFormat};

use crate::error::{Error, Result};

/// Covers taller than this are scaled down on import.
pub const THUMBNAIL_MAX_HEIGHT: u32 = 400;
const THUMBNAIL_QUALITY: u8 = 80;

/// Downsizes a cover to at most [`THUMBNAIL_MAX_HEIGHT`] and re-encodes it as JPEG.
/// Bytes the `image` crate cannot decode are returned unchanged.
pub fn make_thumbnail(bytes: &[u8]) -> Vec<u8> {
    match encode_thumbnail(bytes) {
        Ok(jpeg) => jpeg,
        Err(e) => {
            tracing::warn!(error = %e, "cover not decodable, storing original bytes");
            bytes.to_vec()
        }
    }
}

fn encode_thumbnail(bytes: &[u8]) -> Result<Vec<u8>> {
    let img = image::load_from_memory(bytes)?;
    let img = if img.height() > THUMBNAIL_MAX_HEIGHT {
        let width = ((img.width() as u64 * THUMBNAIL_MAX_HEIGHT as u64) / img.height() as u64)
            .max(1) as u32;
        img.resize_exact(width, THUMBNAIL_MAX_HEIGHT, FilterType::Triangle)
    } else {
        img
    };

    // JPEG has no alpha
    let rgb = img.to_rgb8();
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, THUMBNAIL_QUALITY).encode(
        rgb.as_raw(),
        rgb.width(),
        rgb.height(),
        ColorType::Rgb8,
    )?;
    Ok(buffer)
}

pub fn mime_type(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Png) => "image/png",
        Ok(ImageFormat::Gif) => "image/gif",
        Ok(ImageFormat::WebP) => "image/webp",
        Ok(ImageFormat::Bmp) => "image/bmp",
        Ok(ImageFormat::Jpeg) => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// `data:image/...;base64,...`
pub fn data_url(bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type(bytes), STANDARD.encode(bytes))
}

/// Reverse of [`data_url`]; also accepts bare base64.
pub fn decode_data_url(value: &str) -> Result<Vec<u8>> {
    let payload = if value.starts_with("data:") {
        value
            .split_once(',')
            .map(|(_, data)| data)
            .ok_or_else(|| Error::Invalid("Invalid data URL format".to_string()))?
    } else {
        value
    };

    STANDARD
        .decode(payload.trim())
        .map_err(|e| Error::Invalid(format!("Base64 decode error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::png_bytes;

    #[test]
    fn test_tall_cover_is_scaled_to_max_height() {
        let thumb = make_thumbnail(&png_bytes(300, 900));
        assert_eq!(mime_type(&thumb), "image/jpeg");
        let img = image::load_from_memory(&thumb).unwrap();
        assert_eq!(img.height(), THUMBNAIL_MAX_HEIGHT);
        assert_eq!(img.width(), 133);
    }

    #[test]
    fn test_small_cover_keeps_size() {
        let thumb = make_thumbnail(&png_bytes(40, 60));
        let img = image::load_from_memory(&thumb).unwrap();
        assert_eq!((img.width(), img.height()), (40, 60));
    }

    #[test]
    fn test_undecodable_cover_is_kept() {
        let junk = b"\x00\x01 not an image".to_vec();
        assert_eq!(make_thumbnail(&junk), junk);
    }

    #[test]
    fn test_data_url_roundtrip() {
        let png = png_bytes(4, 4);
        let url = data_url(&png);
        assert!(url.starts_with("data:image/png;base64,"));
        assert_eq!(decode_data_url(&url).unwrap(), png);
        assert!(decode_data_url("data:image/png;base64").is_err());
    }
}
