//! Post-processing of generated artwork into e-paper renditions.
//!
//! | Step | Function |
//! |---|---|
//! | Decode (PNG, JPEG, WebP) | `image::load_from_memory` |
//! | Cover crop | `DynamicImage::resize_to_fill` with `Lanczos3` |
//! | Grayscale | `DynamicImage::to_luma8` |
//! | Date banner | [`banner::draw`] (`rusttype` glyph rasterisation) |
//! | Depth reduction | [`quantize`] |
//! | Encode | `JpegEncoder`, quality 85, single luma channel |
//!
//! Everything here is pure: identical input bytes and overlay produce
//! identical output bytes.

pub mod banner;
mod variant;

use std::path::Path;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, GrayImage, ImageEncoder};
use rusttype::Font;
use thiserror::Error;
use tracing::{debug, warn};

use crate::keys;
use crate::record::month_name;
use crate::store::JPEG_CONTENT_TYPE;

pub use variant::{quantize, VariantSpec};

pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// DejaVu Sans Bold, the overlay font used unless another is configured.
/// Licence terms ship alongside it in `fonts/LICENSE`.
pub const BUNDLED_FONT: &[u8] = include_bytes!("../../fonts/DejaVuSans-Bold.ttf");

#[derive(Debug, Error)]
pub enum ImagingError {
    #[error("failed to decode source image: {0}")]
    Decode(String),
    #[error("failed to encode rendition: {0}")]
    Encode(String),
    #[error("overlay font unusable: {0}")]
    Font(String),
    #[error("invalid variant: {0}")]
    InvalidVariant(String),
}

/// The date burned into the banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overlay {
    pub month: u32,
    pub day: u32,
    pub year: i32,
}

impl Overlay {
    /// Calendar day of `date` paired with the event's year.
    pub fn for_event(date: NaiveDate, year: i32) -> Self {
        Self {
            month: date.month(),
            day: date.day(),
            year,
        }
    }

    /// `"July 4, 1776"`; years before the common era read `"44 BC"`.
    pub fn text(&self) -> String {
        let month = month_name(self.month).unwrap_or("Unknown");
        if self.year < 0 {
            format!("{month} {}, {} BC", self.day, self.year.unsigned_abs())
        } else {
            format!("{month} {}, {}", self.day, self.year)
        }
    }
}

/// One encoded rendition and where it belongs.
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub key: String,
    pub variant: VariantSpec,
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

/// Turns one generated image into every configured rendition.
#[derive(Clone)]
pub struct PostProcessor {
    font: Option<Arc<Font<'static>>>,
    quality: u8,
}

impl Default for PostProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PostProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostProcessor")
            .field("has_font", &self.font.is_some())
            .field("quality", &self.quality)
            .finish()
    }
}

impl PostProcessor {
    /// A processor drawing banner text with the bundled font.
    pub fn new() -> Self {
        let font = Font::try_from_bytes(BUNDLED_FONT);
        if font.is_none() {
            warn!("Bundled overlay font is unreadable; date banners will be drawn without text");
        }
        Self {
            font: font.map(Arc::new),
            quality: DEFAULT_JPEG_QUALITY,
        }
    }

    pub fn with_font_bytes(bytes: Vec<u8>) -> Result<Self, ImagingError> {
        let font = Font::try_from_vec(bytes)
            .ok_or_else(|| ImagingError::Font("not a TrueType/OpenType font".to_string()))?;
        Ok(Self {
            font: Some(Arc::new(font)),
            quality: DEFAULT_JPEG_QUALITY,
        })
    }

    /// Load the overlay font from `path`, or use the bundled one.
    pub fn from_font_path(path: Option<&Path>) -> Result<Self, ImagingError> {
        match path {
            Some(path) => {
                let bytes = std::fs::read(path)
                    .map_err(|e| ImagingError::Font(format!("{}: {e}", path.display())))?;
                debug!(path = %path.display(), "Loaded overlay font");
                Self::with_font_bytes(bytes)
            }
            None => {
                debug!("Using the bundled overlay font");
                Ok(Self::new())
            }
        }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Produce every rendition in `variants` from `source`, keyed under `date`.
    pub fn process(
        &self,
        source: &[u8],
        date: NaiveDate,
        variants: &[VariantSpec],
        overlay: Option<&Overlay>,
    ) -> Result<Vec<ProcessedImage>, ImagingError> {
        let decoded =
            image::load_from_memory(source).map_err(|e| ImagingError::Decode(e.to_string()))?;
        debug!(
            width = decoded.width(),
            height = decoded.height(),
            variants = variants.len(),
            "Decoded source image"
        );

        variants
            .iter()
            .map(|spec| {
                spec.validate()?;
                let gray = self.render_variant(&decoded, spec, overlay);
                Ok(ProcessedImage {
                    key: keys::image_key(date, &spec.key()),
                    variant: *spec,
                    bytes: self.encode(&gray)?,
                    content_type: JPEG_CONTENT_TYPE,
                })
            })
            .collect()
    }

    /// Cover-crop, grayscale, banner and quantise one rendition.
    pub fn render_variant(
        &self,
        source: &DynamicImage,
        spec: &VariantSpec,
        overlay: Option<&Overlay>,
    ) -> GrayImage {
        let mut gray = source
            .resize_to_fill(spec.width, spec.height, FilterType::Lanczos3)
            .to_luma8();
        if let Some(overlay) = overlay {
            banner::draw(&mut gray, &overlay.text(), self.font.as_deref());
        }
        if spec.grayscale_levels < 256 {
            for pixel in gray.pixels_mut() {
                pixel.0[0] = quantize(pixel.0[0], spec.grayscale_levels);
            }
        }
        gray
    }

    fn encode(&self, gray: &GrayImage) -> Result<Vec<u8>, ImagingError> {
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, self.quality)
            .write_image(
                gray.as_raw(),
                gray.width(),
                gray.height(),
                ExtendedColorType::L8,
            )
            .map_err(|e| ImagingError::Encode(e.to_string()))?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ColorType, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png(img: RgbImage) -> Vec<u8> {
        let mut out = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    fn gradient(width: u32, height: u32) -> Vec<u8> {
        png(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        }))
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 4).unwrap()
    }

    #[test]
    fn test_overlay_text() {
        let overlay = Overlay::for_event(date(), 1776);
        assert_eq!(overlay.text(), "July 4, 1776");
        let ancient = Overlay {
            month: 3,
            day: 15,
            year: -44,
        };
        assert_eq!(ancient.text(), "March 15, 44 BC");
    }

    #[test]
    fn test_variants_have_requested_size_and_single_channel() {
        let processor = PostProcessor::new();
        let out = processor
            .process(&gradient(1792, 1024), date(), &VariantSpec::defaults(), None)
            .unwrap();
        assert_eq!(out.len(), 2);

        for rendition in &out {
            let decoded = image::load_from_memory(&rendition.bytes).unwrap();
            assert_eq!(decoded.color(), ColorType::L8);
            assert_eq!(decoded.width(), rendition.variant.width);
            assert_eq!(decoded.height(), rendition.variant.height);
            assert_eq!(rendition.content_type, "image/jpeg");
        }
        assert_eq!(out[0].key, "images/2024-07-04/960x540-gray16.jpg");
        assert_eq!(out[1].key, "images/2024-07-04/1024x1024-gray256.jpg");
    }

    #[test]
    fn test_output_is_deterministic() {
        let processor = PostProcessor::new();
        let source = gradient(640, 480);
        let overlay = Overlay::for_event(date(), 1776);
        let specs = VariantSpec::defaults();
        let a = processor.process(&source, date(), &specs, Some(&overlay)).unwrap();
        let b = processor.process(&source, date(), &specs, Some(&overlay)).unwrap();
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.bytes, y.bytes);
        }
    }

    #[test]
    fn test_cover_crop_keeps_center() {
        // White center third, black sides; a square crop keeps only the center.
        let source = RgbImage::from_fn(300, 100, |x, _| {
            if (100..200).contains(&x) {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        });
        let rendered = PostProcessor::new().render_variant(
            &DynamicImage::ImageRgb8(source),
            &VariantSpec::new(100, 100, 256),
            None,
        );
        assert_eq!(rendered.dimensions(), (100, 100));
        assert!(rendered.get_pixel(50, 50).0[0] > 240);
        assert!(rendered.get_pixel(10, 50).0[0] > 200);
    }

    #[test]
    fn test_render_quantizes_including_banner() {
        let source = DynamicImage::ImageRgb8(gradient_image(320, 180));
        let overlay = Overlay::for_event(date(), 1969);
        let rendered = PostProcessor::new().render_variant(
            &source,
            &VariantSpec::new(320, 180, 4),
            Some(&overlay),
        );
        let palette = [0u8, 85, 170, 255];
        assert!(rendered.pixels().all(|p| palette.contains(&p.0[0])));
    }

    #[test]
    fn test_overlay_darkens_bottom_band() {
        let source = DynamicImage::ImageRgb8(RgbImage::from_pixel(200, 100, Rgb([200, 200, 200])));
        let spec = VariantSpec::new(200, 100, 256);
        let processor = PostProcessor::new();
        let plain = processor.render_variant(&source, &spec, None);
        let bannered =
            processor.render_variant(&source, &spec, Some(&Overlay::for_event(date(), 1776)));
        // Right edge of the band: past the end of the text.
        assert_eq!(plain.get_pixel(195, 98), bannered.get_pixel(195, 10));
        assert!(bannered.get_pixel(195, 98).0[0] < plain.get_pixel(195, 98).0[0]);
    }

    #[test]
    fn test_overlay_draws_date_text_in_band() {
        let source = DynamicImage::ImageRgb8(RgbImage::from_pixel(960, 540, Rgb([120, 120, 120])));
        let spec = VariantSpec::new(960, 540, 256);
        let processor = PostProcessor::new();
        assert!(processor.has_font());

        let plain = processor.render_variant(&source, &spec, None);
        let bannered =
            processor.render_variant(&source, &spec, Some(&Overlay::for_event(date(), 1776)));
        // Band starts at row 482; text starts 15px in and is far shorter than the width.
        let lit = (482..540)
            .flat_map(|y| (0..480).map(move |x| (x, y)))
            .filter(|&(x, y)| bannered.get_pixel(x, y).0[0] > 200)
            .count();
        assert!(lit > 100, "expected glyph pixels in the band, found {lit}");
        assert!((482..540).all(|y| bannered.get_pixel(955, y).0[0] < plain.get_pixel(955, y).0[0]));
        assert!((0..482).all(|y| bannered.get_pixel(100, y) == plain.get_pixel(100, y)));
    }

    #[test]
    fn test_undecodable_source() {
        let err = PostProcessor::new()
            .process(b"not an image", date(), &VariantSpec::defaults(), None)
            .unwrap_err();
        assert!(matches!(err, ImagingError::Decode(_)));
    }

    #[test]
    fn test_invalid_font_bytes() {
        let err = PostProcessor::with_font_bytes(vec![0, 1, 2, 3]).unwrap_err();
        assert!(matches!(err, ImagingError::Font(_)));
    }

    #[test]
    fn test_missing_font_file() {
        let err = PostProcessor::from_font_path(Some(Path::new("/nonexistent/font.ttf")))
            .unwrap_err();
        assert!(matches!(err, ImagingError::Font(_)));
        assert!(PostProcessor::from_font_path(None).unwrap().has_font());
    }

    fn gradient_image(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        })
    }
}
