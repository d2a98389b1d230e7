mod blocks;
mod cluster;
mod color;
mod geom;
mod layout;
mod parse;
mod preprocess;
mod redistribute;
mod tesseract;
mod vision;

use anyhow::Result;
use std::future::Future;
use std::pin::Pin;

pub use blocks::{assemble_blocks, extract_words};
pub use cluster::{ClusterConfig, group_words_into_lines};
pub use color::{
    BackgroundMode, ColorConfig, estimate_background, estimate_background_dominant,
    estimate_word_color,
};
pub use layout::{FitConfig, consistent_block_size, fit_font_size};
pub use parse::parse_hocr_pages;
pub use redistribute::{is_list_prefix, split_translated_block};
pub use tesseract::{TesseractOcr, list_tesseract_languages};
pub use vision::{VisionJsonOcr, parse_vision_response};

/// Pages → blocks → paragraphs → words, as reported by a document OCR service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentPage {
    pub blocks: Vec<DocumentBlock>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentBlock {
    pub confidence: f32,
    pub paragraphs: Vec<DocumentParagraph>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentParagraph {
    pub words: Vec<DocumentWord>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentWord {
    pub symbols: Vec<String>,
    pub vertices: Vec<Vertex>,
    pub confidence: Option<f32>,
}

impl DocumentWord {
    pub fn text(&self) -> String {
        self.symbols.concat()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Vertex {
    pub x: i32,
    pub y: i32,
}

pub type DetectFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<DocumentPage>>> + Send + 'a>>;

/// Document text detection over an encoded capture.
pub trait DetectText: Send + Sync {
    fn detect_document_text<'a>(&'a self, image_png: &'a [u8]) -> DetectFuture<'a>;
}
