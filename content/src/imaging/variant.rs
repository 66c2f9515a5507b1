//! Device-targeted rendition specs and the pure calculations around them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ImagingError;
use crate::record::DeviceProfile;

/// Width, height and grayscale depth of one stored rendition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariantSpec {
    pub width: u32,
    pub height: u32,
    /// Number of gray levels (2..=256). 256 means full 8-bit depth.
    pub grayscale_levels: u32,
}

impl VariantSpec {
    pub const fn new(width: u32, height: u32, grayscale_levels: u32) -> Self {
        Self {
            width,
            height,
            grayscale_levels,
        }
    }

    /// Renditions stored when nothing else is configured: the 4.7" e-paper
    /// panel and a square full-depth version for the web frontend.
    pub fn defaults() -> Vec<Self> {
        vec![Self::new(960, 540, 16), Self::new(1024, 1024, 256)]
    }

    /// File name under the date prefix (`960x540-gray16.jpg`).
    pub fn key(&self) -> String {
        format!("{}x{}-gray{}.jpg", self.width, self.height, self.grayscale_levels)
    }

    pub fn validate(&self) -> Result<(), ImagingError> {
        if self.width == 0 || self.height == 0 {
            return Err(ImagingError::InvalidVariant(format!(
                "{self}: dimensions must be non-zero"
            )));
        }
        if !(2..=256).contains(&self.grayscale_levels) {
            return Err(ImagingError::InvalidVariant(format!(
                "{self}: grayscale levels must be within 2..=256"
            )));
        }
        Ok(())
    }

    fn matches(&self, profile: &DeviceProfile) -> bool {
        self.width == profile.width
            && self.height == profile.height
            && self.grayscale_levels == profile.grayscale_levels
    }

    /// The variant serving `profile`: an exact match when one exists, otherwise
    /// the closest by summed width/height distance, ties broken by depth.
    pub fn select<'a>(profile: &DeviceProfile, specs: &'a [Self]) -> Option<&'a Self> {
        if let Some(exact) = specs.iter().find(|s| s.matches(profile)) {
            return Some(exact);
        }
        specs.iter().min_by_key(|s| {
            // Summed in u64: two u32 distances can exceed u32::MAX.
            let size = u64::from(s.width.abs_diff(profile.width))
                + u64::from(s.height.abs_diff(profile.height));
            let depth = s.grayscale_levels.abs_diff(profile.grayscale_levels);
            (size, depth)
        })
    }

    /// Parse a comma-separated list such as `960x540x16,1024x1024x256`.
    pub fn parse_list(list: &str) -> Result<Vec<Self>, ImagingError> {
        let specs = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<Self>, _>>()?;
        if specs.is_empty() {
            return Err(ImagingError::InvalidVariant(
                "variant list is empty".to_string(),
            ));
        }
        Ok(specs)
    }
}

impl fmt::Display for VariantSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.grayscale_levels)
    }
}

impl FromStr for VariantSpec {
    type Err = ImagingError;

    /// `WIDTHxHEIGHTxLEVELS`, e.g. `960x540x16`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(['x', 'X']).collect();
        let [w, h, levels] = parts.as_slice() else {
            return Err(ImagingError::InvalidVariant(format!(
                "{s}: expected WIDTHxHEIGHTxLEVELS"
            )));
        };
        let num = |v: &str| {
            v.trim()
                .parse::<u32>()
                .map_err(|_| ImagingError::InvalidVariant(format!("{s}: `{v}` is not a number")))
        };
        let spec = Self::new(num(*w)?, num(*h)?, num(*levels)?);
        spec.validate()?;
        Ok(spec)
    }
}

/// Quantise an 8-bit gray value to `levels` evenly spaced levels.
pub fn quantize(value: u8, levels: u32) -> u8 {
    if levels >= 256 {
        return value;
    }
    let steps = (levels.max(2) - 1) as f32;
    let level = (f32::from(value) * steps / 255.0).round();
    (level * 255.0 / steps).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(width: u32, height: u32, levels: u32) -> DeviceProfile {
        DeviceProfile {
            width,
            height,
            grayscale_levels: levels,
            ..DeviceProfile::default()
        }
    }

    #[test]
    fn test_key() {
        assert_eq!(VariantSpec::new(960, 540, 16).key(), "960x540-gray16.jpg");
        assert_eq!(
            VariantSpec::new(1024, 1024, 256).key(),
            "1024x1024-gray256.jpg"
        );
    }

    #[test]
    fn test_parse_list() {
        let specs = VariantSpec::parse_list(" 960x540x16, 1024X1024X256 ,").unwrap();
        assert_eq!(specs, VariantSpec::defaults());
    }

    #[test]
    fn test_parse_rejects_bad_specs() {
        assert!("960x540".parse::<VariantSpec>().is_err());
        assert!("960x540xabc".parse::<VariantSpec>().is_err());
        assert!("0x540x16".parse::<VariantSpec>().is_err());
        assert!("960x540x1".parse::<VariantSpec>().is_err());
        assert!("960x540x512".parse::<VariantSpec>().is_err());
        assert!(VariantSpec::parse_list(" , ").is_err());
    }

    #[test]
    fn test_select_exact_match() {
        let specs = VariantSpec::defaults();
        let chosen = VariantSpec::select(&profile(1024, 1024, 256), &specs).unwrap();
        assert_eq!(chosen.key(), "1024x1024-gray256.jpg");
    }

    #[test]
    fn test_select_nearest() {
        let specs = VariantSpec::defaults();
        // An 800x480 panel is closest to the 960x540 rendition.
        let chosen = VariantSpec::select(&profile(800, 480, 4), &specs).unwrap();
        assert_eq!(chosen.key(), "960x540-gray16.jpg");
        assert!(VariantSpec::select(&profile(800, 480, 4), &[]).is_none());
    }

    #[test]
    fn test_select_depth_breaks_ties() {
        let specs = [VariantSpec::new(960, 540, 256), VariantSpec::new(960, 540, 16)];
        let chosen = VariantSpec::select(&profile(960, 540, 4), &specs).unwrap();
        assert_eq!(chosen.grayscale_levels, 16);
    }

    #[test]
    fn test_select_with_extreme_dimensions() {
        let specs = VariantSpec::defaults();
        let chosen = VariantSpec::select(&profile(u32::MAX, u32::MAX, 16), &specs).unwrap();
        assert_eq!(chosen.key(), "1024x1024-gray256.jpg");
        let chosen = VariantSpec::select(&profile(u32::MAX, 1, u32::MAX), &specs).unwrap();
        assert_eq!(chosen.key(), "960x540-gray16.jpg");
    }

    #[test]
    fn test_quantize() {
        assert_eq!(quantize(200, 256), 200);
        assert_eq!(quantize(100, 2), 0);
        assert_eq!(quantize(130, 2), 255);
        for v in 0..=255u8 {
            assert_eq!(quantize(v, 16) % 17, 0);
        }
    }
}
