//! Grayscale PNG render of a field snapshot.

use harmonic_core::FieldSnapshot;
use image::{GrayImage, ImageResult, Luma};
use std::path::Path;

/// Low potential renders dark, high potential light, stretched over the
/// snapshot's own range.
pub fn render_field(snapshot: &FieldSnapshot, path: &Path) -> ImageResult<()> {
    let (lo, hi) = snapshot.range();
    let span = hi - lo;

    let img = GrayImage::from_fn(snapshot.width as u32, snapshot.height as u32, |x, y| {
        let t = match snapshot.value(x as usize, y as usize) {
            Some(v) if span > 0.0 => (v - lo) / span,
            _ => 0.5,
        };
        Luma([(t.clamp(0.0, 1.0) * 255.0).round() as u8])
    });
    img.save(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_stretches_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("field.png");
        let snapshot = FieldSnapshot {
            width: 3,
            height: 1,
            values: vec![0.0, 0.5, 1.0],
        };
        render_field(&snapshot, &path).unwrap();

        let img = image::open(&path).unwrap().into_luma8();
        assert_eq!(img.dimensions(), (3, 1));
        assert_eq!(img.get_pixel(0, 0).0, [0]);
        assert_eq!(img.get_pixel(1, 0).0, [128]);
        assert_eq!(img.get_pixel(2, 0).0, [255]);
    }
}
