//! services/api/src/adapters/codec.rs
//!
//! Upload decoding and download encoding backed by the `image` crate.
//! Implements the `ImageCodec` port from the `core` crate.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{ImageFormat, RgbImage};
use image_enhancer_core::domain::ExportFormat;
use image_enhancer_core::ports::{ImageCodec, PortError, PortResult};

/// Upload formats accepted by the enhancement view.
const ACCEPTED_UPLOADS: [ImageFormat; 4] = [
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::Bmp,
    ImageFormat::Tiff,
];

const DEFAULT_JPEG_QUALITY: u8 = 90;

#[derive(Clone, Debug)]
pub struct ImageRsCodec {
    jpeg_quality: u8,
}

impl Default for ImageRsCodec {
    fn default() -> Self {
        Self {
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl ImageRsCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ImageCodec for ImageRsCodec {
    fn decode(&self, data: &[u8]) -> PortResult<RgbImage> {
        let format = image::guess_format(data)
            .map_err(|_| PortError::Decode("unrecognised image data".to_string()))?;
        if !ACCEPTED_UPLOADS.contains(&format) {
            return Err(PortError::Decode(format!(
                "{:?} files are not accepted; upload JPEG, PNG, BMP or TIFF",
                format
            )));
        }

        let decoded = image::load_from_memory_with_format(data, format)
            .map_err(|e| PortError::Decode(e.to_string()))?;
        // Grayscale sources are broadcast to three channels and alpha is dropped.
        Ok(decoded.to_rgb8())
    }

    fn encode(&self, image: &RgbImage, format: ExportFormat) -> PortResult<Vec<u8>> {
        let mut buffer = Vec::new();
        let result = match format {
            ExportFormat::Png => image.write_with_encoder(PngEncoder::new(&mut buffer)),
            ExportFormat::Jpeg => image.write_with_encoder(JpegEncoder::new_with_quality(
                &mut buffer,
                self.jpeg_quality,
            )),
            ExportFormat::WebP => image.write_with_encoder(WebPEncoder::new_lossless(&mut buffer)),
        };
        result.map_err(|e| PortError::Encode(format!("{:?}: {}", format, e)))?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, Luma, Rgb, Rgba, RgbaImage};
    use std::io::Cursor;

    fn sample() -> RgbImage {
        RgbImage::from_fn(17, 9, |x, y| Rgb([(x * 15) as u8, (y * 28) as u8, ((x + y) * 7) as u8]))
    }

    fn encode_as(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, format).unwrap();
        out.into_inner()
    }

    #[test]
    fn png_round_trip_is_lossless() {
        let codec = ImageRsCodec::new();
        let original = sample();
        let bytes = codec.encode(&original, ExportFormat::Png).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Png);
        assert_eq!(codec.decode(&bytes).unwrap(), original);
    }

    #[test]
    fn lossy_exports_keep_dimensions_and_channels() {
        let codec = ImageRsCodec::new();
        let original = sample();
        for format in [ExportFormat::Jpeg, ExportFormat::WebP] {
            let bytes = codec.encode(&original, format).unwrap();
            let decoded = image::load_from_memory(&bytes).unwrap();
            assert_eq!(decoded.width(), 17, "{:?}", format);
            assert_eq!(decoded.height(), 9, "{:?}", format);
            assert_eq!(decoded.to_rgb8().as_raw().len(), 17 * 9 * 3);
        }
    }

    #[test]
    fn grayscale_uploads_are_broadcast_to_three_channels() {
        let gray = GrayImage::from_fn(4, 4, |x, _| Luma([(x * 60) as u8]));
        let bytes = encode_as(DynamicImage::ImageLuma8(gray), ImageFormat::Png);

        let decoded = ImageRsCodec::new().decode(&bytes).unwrap();
        assert_eq!(decoded.get_pixel(2, 1).0, [120, 120, 120]);
    }

    #[test]
    fn alpha_is_dropped_on_upload() {
        let rgba = RgbaImage::from_pixel(3, 3, Rgba([10, 20, 30, 40]));
        let bytes = encode_as(DynamicImage::ImageRgba8(rgba), ImageFormat::Png);

        let decoded = ImageRsCodec::new().decode(&bytes).unwrap();
        assert_eq!(decoded.get_pixel(0, 0).0, [10, 20, 30]);
    }

    #[test]
    fn bmp_and_tiff_uploads_are_accepted() {
        let codec = ImageRsCodec::new();
        for format in [ImageFormat::Bmp, ImageFormat::Tiff] {
            let bytes = encode_as(DynamicImage::ImageRgb8(sample()), format);
            assert_eq!(codec.decode(&bytes).unwrap(), sample(), "{:?}", format);
        }
    }

    #[test]
    fn corrupt_and_foreign_uploads_fail_to_decode() {
        let codec = ImageRsCodec::new();
        assert!(matches!(codec.decode(b"definitely not an image"), Err(PortError::Decode(_))));

        let mut truncated = codec.encode(&sample(), ExportFormat::Png).unwrap();
        truncated.truncate(40);
        assert!(matches!(codec.decode(&truncated), Err(PortError::Decode(_))));

        let webp = codec.encode(&sample(), ExportFormat::WebP).unwrap();
        assert!(matches!(codec.decode(&webp), Err(PortError::Decode(_))));
    }
}
