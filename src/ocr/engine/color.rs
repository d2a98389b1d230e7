use image::RgbaImage;
use std::collections::HashMap;

use crate::ocr::{BBoxPx, Rgb};

use super::geom::{clamp_to_image, expand};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundMode {
    /// Average of the 1-pixel ring around the line box.
    Border,
    /// Most frequent color of the line box grown by `margin` pixels.
    Dominant { margin: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColorConfig {
    pub difference_threshold: f32,
    pub background: BackgroundMode,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            difference_threshold: 50.0,
            background: BackgroundMode::Border,
        }
    }
}

impl ColorConfig {
    pub(super) fn line_background(&self, image: &RgbaImage, region: &BBoxPx) -> Rgb {
        match self.background {
            BackgroundMode::Border => estimate_background(image, region),
            BackgroundMode::Dominant { margin } => {
                estimate_background_dominant(image, region, margin)
            }
        }
    }
}

/// Averages the border ring of `region`. Falls back to black when the region
/// lies outside the image.
pub fn estimate_background(image: &RgbaImage, region: &BBoxPx) -> Rgb {
    let Some(region) = clamp_to_image(region, image.width(), image.height()) else {
        return Rgb::BLACK;
    };
    let (x1, y1) = (region.x, region.y);
    let (x2, y2) = (region.right() - 1, region.bottom() - 1);

    let mut totals = [0u64; 3];
    let mut count = 0u64;
    let mut add = |x: u32, y: u32| {
        let color = Rgb::from(*image.get_pixel(x, y));
        totals[0] += color.r as u64;
        totals[1] += color.g as u64;
        totals[2] += color.b as u64;
        count += 1;
    };
    for x in x1..=x2 {
        add(x, y1);
        add(x, y2);
    }
    for y in y1..=y2 {
        add(x1, y);
        add(x2, y);
    }

    Rgb::new(
        (totals[0] / count) as u8,
        (totals[1] / count) as u8,
        (totals[2] / count) as u8,
    )
}

/// Most frequent exact color over `region` grown by `margin`.
pub fn estimate_background_dominant(image: &RgbaImage, region: &BBoxPx, margin: u32) -> Rgb {
    let grown = expand(region, margin);
    let Some(grown) = clamp_to_image(&grown, image.width(), image.height()) else {
        return Rgb::BLACK;
    };
    let histogram = histogram(image, &grown, |_| true);
    most_frequent(histogram).unwrap_or(Rgb::BLACK)
}

/// Most frequent color among pixels of `word_box` that stand out from
/// `background`. White when no pixel qualifies.
pub fn estimate_word_color(
    image: &RgbaImage,
    word_box: &BBoxPx,
    background: Rgb,
    threshold: f32,
) -> Rgb {
    let Some(region) = clamp_to_image(word_box, image.width(), image.height()) else {
        return Rgb::WHITE;
    };
    let histogram = histogram(image, &region, |color| {
        color.distance(&background) > threshold
    });
    most_frequent(histogram).unwrap_or(Rgb::WHITE)
}

fn histogram<F>(image: &RgbaImage, region: &BBoxPx, keep: F) -> HashMap<Rgb, u32>
where
    F: Fn(&Rgb) -> bool,
{
    let mut counts = HashMap::new();
    for y in region.y..region.bottom() {
        for x in region.x..region.right() {
            let color = Rgb::from(*image.get_pixel(x, y));
            if keep(&color) {
                *counts.entry(color).or_insert(0u32) += 1;
            }
        }
    }
    counts
}

// Ties resolve to the smallest color so results do not depend on hash order.
fn most_frequent(histogram: HashMap<Rgb, u32>) -> Option<Rgb> {
    histogram
        .into_iter()
        .max_by(|(a_color, a_count), (b_color, b_count)| {
            a_count.cmp(b_count).then_with(|| b_color.cmp(a_color))
        })
        .map(|(color, _)| color)
}
