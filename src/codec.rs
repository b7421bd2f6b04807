//! Upload decoding with intake limits, and raster encoding for commits and export.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageReader, RgbaImage};
use thiserror::Error;

use crate::config::{EditorConfig, DEFAULT_MAX_DIMENSION, DEFAULT_MAX_UPLOAD_BYTES};

#[derive(Debug, Error)]
pub enum InputRejection {
    #[error("upload is empty")]
    Empty,
    #[error("upload of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: u64, limit: u64 },
    #[error("image dimensions {width}x{height} exceed the {limit}px limit")]
    DimensionsTooLarge { width: u32, height: u32, limit: u32 },
    #[error("image has zero width or height")]
    EmptyImage,
    #[error("image could not be decoded: {0}")]
    Undecodable(#[source] image::ImageError),
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to encode {format}: {source}")]
    Encode {
        format: &'static str,
        #[source]
        source: image::ImageError,
    },
    #[error("cannot allocate a {width}x{height} raster")]
    Allocation { width: u32, height: u32 },
    #[error("crop region is empty")]
    EmptyRegion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_bytes: u64,
    pub max_dimension: u32,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }
}

impl From<&EditorConfig> for UploadLimits {
    fn from(config: &EditorConfig) -> Self {
        Self {
            max_bytes: config.max_upload_bytes,
            max_dimension: config.max_dimension,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    Jpeg { quality: u8 },
    WebP,
}

impl OutputFormat {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Png => "PNG",
            Self::Jpeg { .. } => "JPEG",
            Self::WebP => "WebP",
        }
    }

    pub const fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg { .. } => "jpg",
            Self::WebP => "webp",
        }
    }

    pub const fn is_lossless(self) -> bool {
        !matches!(self, Self::Jpeg { .. })
    }

    pub fn from_extension(extension: &str, quality: u8) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg {
                quality: quality.clamp(1, 100),
            }),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }
}

/// Validates size, then dimensions, then decodes to RGBA.
pub fn decode_upload(
    bytes: &[u8],
    declared_size: u64,
    limits: UploadLimits,
) -> Result<RgbaImage, InputRejection> {
    let size = declared_size.max(bytes.len() as u64);
    if bytes.is_empty() {
        return Err(InputRejection::Empty);
    }
    if size > limits.max_bytes {
        return Err(InputRejection::TooLarge {
            size,
            limit: limits.max_bytes,
        });
    }

    let (width, height) = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|err| InputRejection::Undecodable(image::ImageError::IoError(err)))?
        .into_dimensions()
        .map_err(InputRejection::Undecodable)?;
    check_dimensions(width, height, limits.max_dimension)?;

    let decoded = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|err| InputRejection::Undecodable(image::ImageError::IoError(err)))?
        .decode()
        .map_err(InputRejection::Undecodable)?;
    Ok(decoded.into_rgba8())
}

pub fn check_dimensions(width: u32, height: u32, max_dimension: u32) -> Result<(), InputRejection> {
    if width == 0 || height == 0 {
        return Err(InputRejection::EmptyImage);
    }
    if width > max_dimension || height > max_dimension {
        return Err(InputRejection::DimensionsTooLarge {
            width,
            height,
            limit: max_dimension,
        });
    }
    Ok(())
}

pub fn encode(image: &RgbaImage, format: OutputFormat) -> Result<Vec<u8>, RenderError> {
    let mut bytes = Vec::new();
    let (width, height) = image.dimensions();
    let result = match format {
        OutputFormat::Png => PngEncoder::new(&mut bytes).write_image(
            image.as_raw(),
            width,
            height,
            ExtendedColorType::Rgba8,
        ),
        OutputFormat::Jpeg { quality } => {
            let rgb = image::DynamicImage::ImageRgba8(image.clone()).into_rgb8();
            JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100)).write_image(
                rgb.as_raw(),
                width,
                height,
                ExtendedColorType::Rgb8,
            )
        }
        OutputFormat::WebP => WebPEncoder::new_lossless(&mut bytes).write_image(
            image.as_raw(),
            width,
            height,
            ExtendedColorType::Rgba8,
        ),
    };
    result.map_err(|source| RenderError::Encode {
        format: format.label(),
        source,
    })?;
    Ok(bytes)
}

#[cfg(test)]
pub(crate) fn png_bytes(width: u32, height: u32, pixel: [u8; 4]) -> Vec<u8> {
    let image = RgbaImage::from_pixel(width, height, image::Rgba(pixel));
    encode(&image, OutputFormat::Png).expect("png encoding should succeed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_round_trips_png_pixels() {
        let bytes = png_bytes(4, 3, [10, 20, 30, 255]);
        let image = decode_upload(&bytes, bytes.len() as u64, UploadLimits::default()).unwrap();
        assert_eq!(image.dimensions(), (4, 3));
        assert_eq!(image.get_pixel(3, 2).0, [10, 20, 30, 255]);
    }

    #[test]
    fn declared_size_over_limit_is_rejected_before_decoding() {
        let limits = UploadLimits {
            max_bytes: 10,
            max_dimension: 100,
        };
        let err = decode_upload(b"not an image", 11, limits).unwrap_err();
        assert!(matches!(err, InputRejection::TooLarge { size: 12, limit: 10 }));
    }

    #[test]
    fn oversized_dimensions_are_rejected() {
        let bytes = png_bytes(12, 4, [0, 0, 0, 255]);
        let limits = UploadLimits {
            max_bytes: u64::MAX,
            max_dimension: 10,
        };
        let err = decode_upload(&bytes, 0, limits).unwrap_err();
        assert!(matches!(
            err,
            InputRejection::DimensionsTooLarge {
                width: 12,
                height: 4,
                limit: 10
            }
        ));
    }

    #[test]
    fn garbage_and_empty_uploads_are_rejected() {
        assert!(matches!(
            decode_upload(b"definitely not pixels", 0, UploadLimits::default()),
            Err(InputRejection::Undecodable(_))
        ));
        assert!(matches!(
            decode_upload(&[], 0, UploadLimits::default()),
            Err(InputRejection::Empty)
        ));
    }

    #[test]
    fn every_output_format_encodes() {
        let image = RgbaImage::from_pixel(8, 8, image::Rgba([200, 100, 50, 255]));
        for format in [
            OutputFormat::Png,
            OutputFormat::Jpeg { quality: 80 },
            OutputFormat::WebP,
        ] {
            let bytes = encode(&image, format).unwrap();
            assert!(!bytes.is_empty(), "{format:?}");
            let decoded = image::load_from_memory(&bytes).unwrap();
            assert_eq!((decoded.width(), decoded.height()), (8, 8));
        }
    }

    #[test]
    fn output_format_from_extension() {
        assert_eq!(OutputFormat::from_extension("PNG", 90), Some(OutputFormat::Png));
        assert_eq!(
            OutputFormat::from_extension("jpeg", 0),
            Some(OutputFormat::Jpeg { quality: 1 })
        );
        assert_eq!(OutputFormat::from_extension("gif", 90), None);
        assert!(!OutputFormat::Jpeg { quality: 90 }.is_lossless());
    }
}
