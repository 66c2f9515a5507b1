//! Date banner burned into the bottom of each rendition.

use image::GrayImage;
use rusttype::{point, Font, Scale};

/// Fraction of the band's existing luminance kept under the 60% black fill.
const BAND_KEEP: f32 = 0.4;
const TEXT_LUMA: f32 = 255.0;

/// Pixel geometry of the banner for an image of a given height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BannerGeometry {
    /// Band height before padding, `round(H * 0.08)`.
    pub band: u32,
    /// Font pixel size, `round(band * 0.7)`.
    pub font_px: u32,
    /// `round(font_px * 0.5)`, used left of the text and above the band.
    pub padding: u32,
    /// First darkened row.
    pub top: u32,
    /// Text baseline row, `H - 0.6 * padding`.
    pub baseline: f32,
}

impl BannerGeometry {
    pub fn for_height(height: u32) -> Self {
        let band = (height as f32 * 0.08).round() as u32;
        let font_px = (band as f32 * 0.7).round() as u32;
        let padding = (font_px as f32 * 0.5).round() as u32;
        Self {
            band,
            font_px,
            padding,
            top: height.saturating_sub(band + padding),
            baseline: height as f32 - padding as f32 * 0.6,
        }
    }
}

/// Darken the band and, when a font is available, draw `text` over it.
pub fn draw(image: &mut GrayImage, text: &str, font: Option<&Font<'static>>) {
    let geometry = BannerGeometry::for_height(image.height());
    darken_band(image, geometry.top);
    if let Some(font) = font {
        draw_text(image, font, &geometry, text);
    }
}

fn darken_band(image: &mut GrayImage, top: u32) {
    let (width, height) = image.dimensions();
    for y in top..height {
        for x in 0..width {
            let pixel = image.get_pixel_mut(x, y);
            pixel.0[0] = (f32::from(pixel.0[0]) * BAND_KEEP).round() as u8;
        }
    }
}

fn draw_text(image: &mut GrayImage, font: &Font<'static>, geometry: &BannerGeometry, text: &str) {
    let scale = Scale::uniform(geometry.font_px as f32);
    let start = point(geometry.padding as f32, geometry.baseline);
    let (width, height) = image.dimensions();

    for glyph in font.layout(text, scale, start) {
        let Some(bb) = glyph.pixel_bounding_box() else {
            continue;
        };
        glyph.draw(|gx, gy, coverage| {
            let px = gx as i32 + bb.min.x;
            let py = gy as i32 + bb.min.y;
            if px < 0 || py < 0 || px as u32 >= width || py as u32 >= height {
                return;
            }
            let dst = image.get_pixel_mut(px as u32, py as u32);
            let under = f32::from(dst.0[0]);
            dst.0[0] = (TEXT_LUMA * coverage + under * (1.0 - coverage)).round() as u8;
        });
    }
}
