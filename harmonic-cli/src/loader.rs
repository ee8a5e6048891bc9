//! Image-file collaborator: decodes a map image into a [`GridMap`].

use harmonic_core::{GridMap, HarmonicError, PixelSource, PixelThresholds, Result};
use image::RgbImage;
use log::info;
use std::path::Path;

/// Decoded image as seen by the core.
pub struct ImagePixels(RgbImage);

impl PixelSource for ImagePixels {
    fn dimensions(&self) -> (u32, u32) {
        self.0.dimensions()
    }

    fn rgb(&self, x: u32, y: u32) -> [u8; 3] {
        self.0.get_pixel(x, y).0
    }
}

/// Load and classify a map image. Decoding failures surface as
/// `InvalidMap`, like any other unusable map.
pub fn load_map(path: &Path, thresholds: &PixelThresholds) -> Result<GridMap> {
    let img = image::open(path)
        .map_err(|e| {
            HarmonicError::InvalidMap(format!(
                "failed to load map image {}: {}",
                path.display(),
                e
            ))
        })?
        .into_rgb8();

    info!(
        "Loaded map image {} ({}x{})",
        path.display(),
        img.width(),
        img.height()
    );
    GridMap::from_pixels(&ImagePixels(img), thresholds)
}
