use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::RgbaImage;
use resvg::render;
use std::io::Cursor;
use std::sync::Arc;
use tiny_skia::Pixmap;
use tracing::debug;
use usvg::{Options, Tree, fontdb};

use super::engine::{FitConfig, consistent_block_size, fit_font_size};
use super::font::{EstimatedMetrics, FontMetrics, MeasureText};
use super::{BBoxPx, TranslatedLine};

#[derive(Debug, Clone)]
pub struct OverlayStyle {
    /// Glyph outline drawn in the line's background color.
    pub outline_width: f32,
    pub font_family: Option<String>,
    pub font_metrics: Option<FontMetrics>,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            outline_width: 2.0,
            font_family: None,
            font_metrics: None,
        }
    }
}

impl OverlayStyle {
    pub fn measure(&self) -> &dyn MeasureText {
        match &self.font_metrics {
            Some(metrics) => metrics,
            None => &EstimatedMetrics,
        }
    }

    fn family(&self) -> Option<&str> {
        self.font_family
            .as_deref()
            .or_else(|| self.font_metrics.as_ref().and_then(|m| m.family()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub line: TranslatedLine,
    pub font_size: f32,
    pub baseline_y: f32,
}

/// Fits every line, then gives all lines of a block the block-consistent size.
///
/// Lines with blank translations keep their place (their background is still
/// painted) but do not take part in the block statistics.
pub fn plan_overlay(
    lines: &[TranslatedLine],
    measure: &dyn MeasureText,
    config: &FitConfig,
) -> Vec<PlacedLine> {
    let fitted = lines
        .iter()
        .map(|line| {
            let text = line.translated_text.trim();
            (!text.is_empty()).then(|| fit_font_size(text, &line.bbox, measure, config))
        })
        .collect::<Vec<_>>();

    let mut block_ids = Vec::new();
    for line in lines {
        if !block_ids.contains(&line.block_id) {
            block_ids.push(line.block_id);
        }
    }

    let mut sizes = vec![config.min_size; lines.len()];
    for block_id in block_ids {
        let members = lines
            .iter()
            .enumerate()
            .filter(|(_, line)| line.block_id == block_id)
            .map(|(idx, _)| idx)
            .collect::<Vec<_>>();
        let block_sizes = members
            .iter()
            .filter_map(|idx| fitted[*idx])
            .collect::<Vec<_>>();
        let size = consistent_block_size(&block_sizes, config.block_blend)
            .unwrap_or(config.min_size)
            .clamp(config.min_size, config.max_size.max(config.min_size));
        debug!("block {} font size {:.1}", block_id, size);
        for idx in members {
            sizes[idx] = size;
        }
    }

    lines
        .iter()
        .zip(sizes)
        .map(|(line, font_size)| PlacedLine {
            baseline_y: baseline_for(&line.bbox, font_size, measure),
            line: line.clone(),
            font_size,
        })
        .collect()
}

fn baseline_for(bbox: &BBoxPx, font_size: f32, measure: &dyn MeasureText) -> f32 {
    let slack = bbox.h as f32 - measure.line_height(font_size);
    bbox.y as f32 + slack * 0.5 + measure.ascent(font_size)
}

/// SVG document: the capture, one opaque fill per line, then outlined glyphs.
pub fn render_svg(
    base_png: &[u8],
    width: u32,
    height: u32,
    placed: &[PlacedLine],
    style: &OverlayStyle,
) -> String {
    let data_uri = format!("data:image/png;base64,{}", BASE64.encode(base_png));

    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = width,
        h = height
    ));
    svg.push_str(&format!(
        r#"<image href="{uri}" xlink:href="{uri}" x="0" y="0" width="{w}" height="{h}" preserveAspectRatio="none"/>"#,
        uri = data_uri,
        w = width,
        h = height
    ));

    for placed_line in placed {
        let BBoxPx { x, y, w, h } = placed_line.line.bbox;
        svg.push_str(&format!(
            r#"<rect x="{x}" y="{y}" width="{w}" height="{h}" fill="{fill}"/>"#,
            fill = placed_line.line.background_color.to_hex()
        ));
    }

    let family = style
        .family()
        .map(|family| format!(r#" font-family="{}""#, escape_xml(family)))
        .unwrap_or_default();
    for placed_line in placed {
        let text = placed_line.line.translated_text.trim();
        if text.is_empty() {
            continue;
        }
        svg.push_str(&format!(
            r#"<text x="{x}" y="{y}" font-size="{size}"{family} fill="{fill}" stroke="{stroke}" stroke-width="{outline}" stroke-linejoin="round" paint-order="stroke" xml:space="preserve">{text}</text>"#,
            x = placed_line.line.bbox.x,
            y = placed_line.baseline_y,
            size = placed_line.font_size,
            family = family,
            fill = placed_line.line.text_color.to_hex(),
            stroke = placed_line.line.background_color.to_hex(),
            outline = style.outline_width,
            text = escape_xml(text)
        ));
    }

    svg.push_str("</svg>");
    svg
}

pub fn render_svg_image(svg: &str, font_data: Option<&[u8]>) -> Result<RgbaImage> {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    if let Some(data) = font_data {
        db.load_font_data(data.to_vec());
    }
    let options = Options {
        fontdb: Arc::new(db),
        ..Options::default()
    };
    let tree = Tree::from_str(svg, &options).with_context(|| "failed to parse SVG")?;
    let size = tree.size().to_int_size();
    let mut pixmap =
        Pixmap::new(size.width(), size.height()).ok_or_else(|| anyhow!("empty SVG size"))?;
    let mut pixmap_mut = pixmap.as_mut();
    render(&tree, tiny_skia::Transform::identity(), &mut pixmap_mut);
    RgbaImage::from_raw(size.width(), size.height(), pixmap.data().to_vec())
        .ok_or_else(|| anyhow!("failed to build image buffer from SVG"))
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .with_context(|| "failed to encode PNG")?;
    Ok(bytes)
}

/// Composites translated lines over `base`. The result has the capture's size.
pub fn render_overlay(
    base: &RgbaImage,
    lines: &[TranslatedLine],
    style: &OverlayStyle,
    config: &FitConfig,
) -> Result<RgbaImage> {
    let (width, height) = base.dimensions();
    if width == 0 || height == 0 {
        return Err(anyhow!("cannot render onto an empty capture"));
    }
    let placed = plan_overlay(lines, style.measure(), config);
    let svg = render_svg(&encode_png(base)?, width, height, &placed, style);
    let font_data = style.font_metrics.as_ref().map(FontMetrics::data);
    let image = render_svg_image(&svg, font_data)?;
    if image.dimensions() != (width, height) {
        return Err(anyhow!(
            "rendered overlay is {}x{}, expected {}x{}",
            image.width(),
            image.height(),
            width,
            height
        ));
    }
    Ok(image)
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::Rgb;
    use image::Rgba;

    fn translated(text: &str, bbox: BBoxPx, block_id: u32) -> TranslatedLine {
        TranslatedLine {
            original_text: "src".to_string(),
            translated_text: text.to_string(),
            bbox,
            text_color: Rgb::WHITE,
            background_color: Rgb::new(20, 40, 60),
            block_id,
        }
    }

    #[test]
    fn plan_keeps_boxes_and_shares_block_size() {
        let lines = vec![
            translated("a much longer translated line", BBoxPx::new(10, 10, 200, 24), 1),
            translated("short", BBoxPx::new(10, 40, 200, 24), 1),
            translated("other block", BBoxPx::new(10, 90, 300, 40), 2),
        ];
        let placed = plan_overlay(&lines, &EstimatedMetrics, &FitConfig::default());

        for (placed_line, line) in placed.iter().zip(&lines) {
            assert_eq!(placed_line.line, *line);
        }
        assert_eq!(placed[0].font_size, placed[1].font_size);
        for placed_line in &placed {
            let bbox = placed_line.line.bbox;
            assert!(placed_line.baseline_y > bbox.y as f32);
            assert!(placed_line.baseline_y <= bbox.bottom() as f32);
            assert!(placed_line.font_size >= 8.0 && placed_line.font_size <= 72.0);
        }
    }

    #[test]
    fn blank_lines_do_not_drive_block_size() {
        let config = FitConfig::default();
        let alone = plan_overlay(
            &[translated("word", BBoxPx::new(0, 0, 120, 30), 1)],
            &EstimatedMetrics,
            &config,
        );
        let with_blank = plan_overlay(
            &[
                translated("word", BBoxPx::new(0, 0, 120, 30), 1),
                translated("   ", BBoxPx::new(0, 40, 4, 4), 1),
            ],
            &EstimatedMetrics,
            &config,
        );
        assert_eq!(alone[0].font_size, with_blank[0].font_size);
        assert_eq!(with_blank[1].font_size, with_blank[0].font_size);
    }

    #[test]
    fn svg_outlines_text_and_escapes_markup() {
        let placed = plan_overlay(
            &[
                translated("Tom & <Jerry>", BBoxPx::new(5, 5, 200, 30), 1),
                translated("", BBoxPx::new(5, 50, 50, 20), 1),
            ],
            &EstimatedMetrics,
            &FitConfig::default(),
        );
        let svg = render_svg(b"png", 240, 80, &placed, &OverlayStyle::default());
        assert!(svg.contains("Tom &amp; &lt;Jerry&gt;"));
        assert!(svg.contains(r#"paint-order="stroke""#));
        assert!(svg.contains(r##"stroke="#14283c""##));
        assert_eq!(svg.matches("<rect").count(), 2);
        assert_eq!(svg.matches("<text").count(), 1);
    }

    #[test]
    fn overlay_matches_capture_size_and_fills_boxes() {
        let base = RgbaImage::from_pixel(64, 32, Rgba([250, 250, 250, 255]));
        let lines = vec![translated("", BBoxPx::new(8, 8, 20, 12), 1)];
        let image = render_overlay(&base, &lines, &OverlayStyle::default(), &FitConfig::default())
            .unwrap();
        assert_eq!(image.dimensions(), (64, 32));
        assert_eq!(*image.get_pixel(18, 14), Rgba([20, 40, 60, 255]));
    }
}
