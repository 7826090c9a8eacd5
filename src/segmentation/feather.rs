//! Alpha mask refinement: speckle removal and soft edges

use crate::morphology::{box_blur, dilate, erode};
use crate::types::{BitMask, Raster, CHANNELS};

/// Morphology and blur radii derived from a 0-100 strength
#[must_use]
pub fn refine_radii(strength: f32) -> (u32, u32) {
    let strength = if strength.is_finite() { strength } else { 0.0 };
    let morph = (strength / 33.0).round().clamp(0.0, 3.0) as u32;
    let blur = (strength / 16.0).round().clamp(0.0, 6.0) as u32;
    (morph, blur)
}

/// Rewrite the alpha channel from a cleaned, feathered version of the cleared-pixel mask
///
/// The mask of fully transparent pixels is closed, opened with a unit
/// kernel to drop isolated specks, pushed outward to swallow color fringes
/// and finally box-blurred. Every pixel's alpha becomes
/// `round(255 * (1 - mask))`, so partially transparent source pixels are
/// snapped to the refined mask as well.
pub fn refine_alpha_mask(raster: &mut Raster, strength: f32) {
    let (morph, blur) = refine_radii(strength);
    let mut mask = BitMask::from_transparent(raster);
    if morph > 0 {
        mask = dilate(&mask, morph);
        mask = erode(&mask, morph);
        mask = erode(&mask, 1);
        mask = dilate(&mask, 1);
        let extra = 2.max((blur as f32 * 0.8).floor() as u32);
        mask = dilate(&mask, extra);
    }

    let soft = box_blur(&mask.to_field(), blur);
    for (px, &a) in raster
        .as_bytes_mut()
        .chunks_exact_mut(CHANNELS)
        .zip(soft.data())
    {
        let a = a.clamp(0.0, 1.0);
        px[3] = (255.0 * (1.0 - a)).round() as u8;
    }
}
