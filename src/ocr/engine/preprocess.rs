use image::{DynamicImage, GrayImage, RgbaImage};

/// Grayscale, upscaled and contrast-stretched copy handed to tesseract.
pub(super) fn preprocess_for_ocr(image: &RgbaImage, scale: u32) -> DynamicImage {
    let (width, height) = image.dimensions();
    let mut luma = GrayImage::new(width, height);

    for (x, y, pixel) in image.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as f32 / 255.0;
        let r = r as f32 * alpha + 255.0 * (1.0 - alpha);
        let g = g as f32 * alpha + 255.0 * (1.0 - alpha);
        let b = b as f32 * alpha + 255.0 * (1.0 - alpha);
        let value = (0.299 * r + 0.587 * g + 0.114 * b).round() as u8;
        luma.put_pixel(x, y, image::Luma([value]));
    }

    let resized = if scale > 1 {
        image::imageops::resize(
            &luma,
            width.saturating_mul(scale),
            height.saturating_mul(scale),
            image::imageops::FilterType::Lanczos3,
        )
    } else {
        luma
    };

    DynamicImage::ImageLuma8(contrast_stretch(&resized))
}

/// Small captures are upscaled; the result stays under 6000px wide.
pub(super) fn ocr_scale(width: u32) -> u32 {
    let max_width = 6000u32;
    let mut scale = 3u32;
    while width.saturating_mul(scale) > max_width && scale > 1 {
        scale -= 1;
    }
    scale.max(1)
}

fn contrast_stretch(image: &GrayImage) -> GrayImage {
    let mut min = 255u8;
    let mut max = 0u8;
    for pixel in image.pixels() {
        let value = pixel[0];
        min = min.min(value);
        max = max.max(value);
    }

    if max <= min {
        return image.clone();
    }

    let scale = 255.0 / (max as f32 - min as f32);
    let mut output = image.clone();
    for pixel in output.pixels_mut() {
        let value = pixel[0];
        pixel[0] = ((value.saturating_sub(min)) as f32 * scale).round() as u8;
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn scale_shrinks_for_wide_captures() {
        assert_eq!(ocr_scale(800), 3);
        assert_eq!(ocr_scale(2500), 2);
        assert_eq!(ocr_scale(7000), 1);
    }

    #[test]
    fn output_is_scaled_and_stretched() {
        let mut image = RgbaImage::from_pixel(4, 2, Rgba([100, 100, 100, 255]));
        image.put_pixel(0, 0, Rgba([150, 150, 150, 255]));
        let processed = preprocess_for_ocr(&image, 2).to_luma8();
        assert_eq!(processed.dimensions(), (8, 4));
        let values = processed.pixels().map(|p| p[0]).collect::<Vec<_>>();
        assert_eq!(values.iter().copied().min(), Some(0));
        assert_eq!(values.iter().copied().max(), Some(255));
    }
}
