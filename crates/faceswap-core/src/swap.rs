//! Swap adapter and post-processing.
//!
//! [`FaceSwapper`] is a placeholder: no identity is transferred. The
//! "swapped" image is a working copy of the source, blended back over the
//! source with the caller's blend strength, which leaves it unchanged.

use crate::types::{FaceDescriptor, PixelGrid, SwapParameters};
use image::Pixel;
use std::path::Path;

/// Contrast gain of the fixed enhancement step.
pub const ENHANCE_ALPHA: f32 = 1.1;
/// Brightness offset of the fixed enhancement step.
pub const ENHANCE_BETA: f32 = 10.0;

/// Placeholder swap model.
#[derive(Debug, Clone)]
pub struct FaceSwapper;

impl FaceSwapper {
    pub fn load(model_dir: &Path) -> Self {
        tracing::info!(model_dir = %model_dir.display(), "face swap model ready (passthrough blend)");
        Self
    }

    /// Apply the swap transform for `target` onto `source`.
    pub fn swap(
        &self,
        source: &PixelGrid,
        target: &FaceDescriptor,
        params: &SwapParameters,
    ) -> PixelGrid {
        tracing::debug!(
            target_confidence = target.confidence,
            blend_strength = params.blend_strength(),
            preserve_identity = params.preserve_identity(),
            face_model = %params.face_model(),
            "applying face swap transformation"
        );

        let swapped = source.clone();
        let blend = params.blend_strength();
        if blend < 1.0 {
            blend_weighted(source, &swapped, blend)
        } else {
            swapped
        }
    }
}

/// Per-sample `round(a * (1 - weight) + b * weight)`, saturated to u8.
///
/// `a` and `b` must share dimensions; the result has the dimensions of `a`.
pub fn blend_weighted(a: &PixelGrid, b: &PixelGrid, weight: f32) -> PixelGrid {
    debug_assert_eq!(a.dimensions(), b.dimensions());
    let wa = 1.0 - weight;
    let mut out = a.clone();
    for (dst, src) in out.pixels_mut().zip(b.pixels()) {
        dst.apply2(src, |x, y| saturate(x as f32 * wa + y as f32 * weight));
    }
    out
}

/// Fixed linear brightness/contrast: `saturate(round(v * 1.1 + 10))`.
pub fn enhance(grid: &mut PixelGrid) {
    adjust_linear(grid, ENHANCE_ALPHA, ENHANCE_BETA);
}

/// Apply `saturate(round(|v * alpha + beta|))` to every sample in place.
pub fn adjust_linear(grid: &mut PixelGrid, alpha: f32, beta: f32) {
    for px in grid.pixels_mut() {
        px.apply(|v| saturate((v as f32 * alpha + beta).abs()));
    }
}

fn saturate(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FaceModel;
    use image::Rgb;

    fn target() -> FaceDescriptor {
        FaceDescriptor {
            x: 10.0, y: 10.0, width: 20.0, height: 20.0,
            confidence: 0.95, landmarks: None,
        }
    }

    fn noise(width: u32, height: u32) -> PixelGrid {
        PixelGrid::from_fn(width, height, |x, y| {
            let v = (x * 31 + y * 17) % 256;
            Rgb([v as u8, (255 - v) as u8, ((v * 3) % 256) as u8])
        })
    }

    #[test]
    fn test_enhance_known_values() {
        let mut grid = PixelGrid::from_pixel(2, 2, Rgb([0, 100, 250]));
        enhance(&mut grid);
        // 0 → 10, 100 → 120, 250 → 285 → 255
        assert_eq!(grid.get_pixel(1, 1), &Rgb([10, 120, 255]));
    }

    #[test]
    fn test_adjust_linear_takes_absolute_value() {
        let mut grid = PixelGrid::from_pixel(1, 1, Rgb([50, 0, 200]));
        adjust_linear(&mut grid, -1.0, 0.0);
        assert_eq!(grid.get_pixel(0, 0), &Rgb([50, 0, 200]));
    }

    #[test]
    fn test_blend_weights() {
        let a = PixelGrid::from_pixel(3, 3, Rgb([0, 0, 0]));
        let b = PixelGrid::from_pixel(3, 3, Rgb([200, 100, 50]));
        let out = blend_weighted(&a, &b, 0.25);
        assert_eq!(out.get_pixel(0, 0), &Rgb([50, 25, 13]));
    }

    #[test]
    fn test_swap_is_identity_for_every_blend() {
        let swapper = FaceSwapper::load(Path::new("/tmp/models"));
        let source = noise(40, 30);
        for blend in [0.0, 0.3, 0.5, 0.8, 1.0] {
            let params = SwapParameters::new(blend, true, FaceModel::Refined).unwrap();
            assert_eq!(swapper.swap(&source, &target(), &params), source, "blend {blend}");
        }
    }

    #[test]
    fn test_full_blend_then_enhance_matches_enhanced_source() {
        let swapper = FaceSwapper::load(Path::new("/tmp/models"));
        let source = noise(16, 16);
        let params = SwapParameters::new(1.0, false, FaceModel::Auto).unwrap();

        let mut result = swapper.swap(&source, &target(), &params);
        enhance(&mut result);

        let mut expected = source.clone();
        adjust_linear(&mut expected, 1.1, 10.0);
        assert_eq!(result, expected);
    }
}
