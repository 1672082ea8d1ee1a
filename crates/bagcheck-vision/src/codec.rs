//! Image codec
//!
//! Turns an uploaded raster image into the base64 JPEG payload embedded in
//! the `data:image/jpeg;base64,...` URI sent to the model.

use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use tracing::{debug, warn};

/// Quality used when none is configured
pub const DEFAULT_JPEG_QUALITY: u8 = 75;

/// MIME type of every payload produced by [`JpegCodec::encode`]
pub const JPEG_MIME_TYPE: &str = "image/jpeg";

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("failed to encode JPEG: {0}")]
    Encode(#[source] image::ImageError),
    #[error("encoded image is empty")]
    Empty,
}

/// Decode an uploaded file in any format the `image` crate recognizes
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, CodecError> {
    image::load_from_memory(bytes).map_err(|e| {
        warn!("Could not decode uploaded image ({} bytes): {}", bytes.len(), e);
        CodecError::Decode(e)
    })
}

#[derive(Debug, Clone, Copy)]
pub struct JpegCodec {
    quality: u8,
}

impl Default for JpegCodec {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl JpegCodec {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Re-encode as 8-bit RGB JPEG and return the standard base64 text.
    ///
    /// Alpha and high bit-depth inputs are flattened to RGB first since
    /// baseline JPEG cannot carry them.
    pub fn encode(&self, image: &DynamicImage) -> Result<String, CodecError> {
        let rgb = DynamicImage::ImageRgb8(image.to_rgb8());

        let mut jpeg = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut jpeg, self.quality);
        rgb.write_with_encoder(encoder).map_err(|e| {
            warn!("Error encoding image: {}", e);
            CodecError::Encode(e)
        })?;

        if jpeg.is_empty() {
            warn!("JPEG encoder produced no bytes");
            return Err(CodecError::Empty);
        }

        debug!(
            "Encoded {}x{} image as {} byte JPEG (quality {})",
            rgb.width(),
            rgb.height(),
            jpeg.len(),
            self.quality
        );

        Ok(base64::engine::general_purpose::STANDARD.encode(&jpeg))
    }

    /// Decode raw upload bytes and encode them in one step
    pub fn encode_upload(&self, bytes: &[u8]) -> Result<String, CodecError> {
        let image = decode(bytes)?;
        self.encode(&image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
    use std::io::Cursor;

    fn unbase64(text: &str) -> Vec<u8> {
        base64::engine::general_purpose::STANDARD
            .decode(text)
            .unwrap()
    }

    #[test]
    fn test_encode_produces_jpeg() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(64, 48, |x, y| {
            Rgb([(x * 4) as u8, (y * 5) as u8, 128])
        }));

        let encoded = JpegCodec::default().encode(&img).unwrap();
        assert!(!encoded.is_empty());

        let bytes = unbase64(&encoded);
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Jpeg);

        let back = image::load_from_memory(&bytes).unwrap();
        assert_eq!((back.width(), back.height()), (64, 48));
    }

    #[test]
    fn test_encode_keeps_content_within_jpeg_tolerance() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 32, Rgb([200, 40, 40])));

        let encoded = JpegCodec::new(90).encode(&img).unwrap();
        let back = image::load_from_memory(&unbase64(&encoded))
            .unwrap()
            .to_rgb8();

        let px = back.get_pixel(16, 16);
        for (got, want) in px.0.iter().zip([200u8, 40, 40]) {
            assert!(
                (*got as i16 - want as i16).abs() <= 12,
                "channel drifted: {} vs {}",
                got,
                want
            );
        }
    }

    #[test]
    fn test_encode_flattens_alpha() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([0, 255, 0, 90])));

        let encoded = JpegCodec::default().encode(&img).unwrap();
        let bytes = unbase64(&encoded);
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_encode_upload_from_png() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([10, 20, 30])));
        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();

        let encoded = JpegCodec::default().encode_upload(&png).unwrap();
        assert!(!encoded.is_empty());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode(b"definitely not an image").unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
    }

    #[test]
    fn test_quality_is_clamped() {
        assert_eq!(JpegCodec::new(0).quality(), 1);
        assert_eq!(JpegCodec::new(250).quality(), 100);
    }
}
