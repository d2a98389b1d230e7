mod engine;
mod font;
mod render;

pub use engine::{
    BackgroundMode, ClusterConfig, ColorConfig, DetectFuture, DetectText, DocumentBlock,
    DocumentPage, DocumentParagraph, DocumentWord, FitConfig, TesseractOcr, Vertex, VisionJsonOcr,
    assemble_blocks, consistent_block_size, estimate_background, estimate_background_dominant,
    estimate_word_color, extract_words, fit_font_size, group_words_into_lines, is_list_prefix,
    list_tesseract_languages, parse_hocr_pages, parse_vision_response, split_translated_block,
};
pub use font::{
    EstimatedMetrics, FontMetrics, MeasureText, ResolvedOverlayFont, load_font_metrics,
    resolve_overlay_font,
};
pub use render::{
    OverlayStyle, PlacedLine, encode_png, plan_overlay, render_overlay, render_svg,
    render_svg_image,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct BBoxPx {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl BBoxPx {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    pub fn right(&self) -> u32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.h
    }

    pub fn center_y(&self) -> f32 {
        self.y as f32 + self.h as f32 * 0.5
    }

    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Euclidean distance in RGB space.
    pub fn distance(&self, other: &Rgb) -> f32 {
        let dr = self.r as f32 - other.r as f32;
        let dg = self.g as f32 - other.g as f32;
        let db = self.b as f32 - other.b as f32;
        (dr * dr + dg * dg + db * db).sqrt()
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl From<image::Rgba<u8>> for Rgb {
    fn from(pixel: image::Rgba<u8>) -> Self {
        let [r, g, b, _] = pixel.0;
        Rgb { r, g, b }
    }
}

/// A single recognized token. Produced once and never mutated; later stages
/// derive new records instead.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct WordDetection {
    pub text: String,
    pub bbox: BBoxPx,
    pub confidence: f32,
    pub text_color: Rgb,
}

impl WordDetection {
    pub fn with_text_color(&self, text_color: Rgb) -> WordDetection {
        WordDetection {
            text_color,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Line {
    pub words: Vec<WordDetection>,
    pub bbox: BBoxPx,
    pub background_color: Rgb,
    pub text: String,
}

impl Line {
    /// Color used for the line's translated glyphs.
    pub fn text_color(&self) -> Rgb {
        self.words
            .first()
            .map(|word| word.text_color)
            .unwrap_or(Rgb::WHITE)
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Block {
    pub block_id: u32,
    pub lines: Vec<Line>,
}

impl Block {
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TranslatedLine {
    pub original_text: String,
    pub translated_text: String,
    pub bbox: BBoxPx,
    pub text_color: Rgb,
    pub background_color: Rgb,
    pub block_id: u32,
}

impl TranslatedLine {
    pub fn from_line(line: &Line, translated_text: String, block_id: u32) -> Self {
        Self {
            original_text: line.text.clone(),
            translated_text,
            bbox: line.bbox,
            text_color: line.text_color(),
            background_color: line.background_color,
            block_id,
        }
    }
}
