use crate::ocr::{BBoxPx, MeasureText};

#[derive(Debug, Clone, PartialEq)]
pub struct FitConfig {
    pub min_size: f32,
    pub max_size: f32,
    /// Fraction of the box width the text may occupy.
    pub width_margin: f32,
    /// Added to the fitted size to leave rendering headroom.
    pub size_correction: f32,
    /// Weight of the smallest line size in the block-wide blend.
    pub block_blend: f32,
    /// Search resolution in font size units.
    pub step: f32,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            min_size: 8.0,
            max_size: 72.0,
            width_margin: 0.98,
            size_correction: -2.0,
            block_blend: 0.85,
            step: 0.5,
        }
    }
}

/// Largest font size at which `text` fits inside `bounds`, searched on a fixed
/// grid of `config.step` so the answer only grows with the box.
///
/// Never fails: when no size fits the result is `config.min_size` and the text
/// is allowed to overflow.
pub fn fit_font_size(
    text: &str,
    bounds: &BBoxPx,
    measure: &dyn MeasureText,
    config: &FitConfig,
) -> f32 {
    let min_size = config.min_size;
    let max_size = config.max_size.max(min_size);
    let upper = (bounds.h as f32).min(max_size);
    if upper < min_size {
        return min_size;
    }

    let step = config.step.max(0.01);
    let size_at = |idx: u32| min_size + idx as f32 * step;
    let fits = |size: f32| {
        measure.text_width(text, size) <= bounds.w as f32 * config.width_margin
            && measure.line_height(size) <= bounds.h as f32
    };
    if !fits(min_size) {
        return min_size;
    }

    let mut lo = 0u32;
    let mut hi = ((upper - min_size) / step).floor() as u32;
    while lo < hi {
        let mid = lo + (hi - lo).div_ceil(2);
        if fits(size_at(mid)) {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }

    (size_at(lo) + config.size_correction).clamp(min_size, max_size)
}

/// Blends the tightest line size with the midpoint of the block's range so one
/// short line cannot inflate the whole block.
pub fn consistent_block_size(sizes: &[f32], blend: f32) -> Option<f32> {
    let min = sizes.iter().copied().reduce(f32::min)?;
    let max = sizes.iter().copied().reduce(f32::max)?;
    let mid = (min + max) * 0.5;
    Some(min * blend + mid * (1.0 - blend))
}
