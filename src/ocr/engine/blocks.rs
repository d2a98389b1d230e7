use image::RgbaImage;
use tracing::debug;

use crate::ocr::{Block, Line, Rgb, WordDetection};

use super::cluster::{ClusterConfig, group_words_into_lines};
use super::color::{ColorConfig, estimate_word_color};
use super::geom::{envelope, union_bbox};
use super::{DocumentBlock, DocumentPage};

// Provisional word colors are measured against this until the line
// background is known.
const PLACEHOLDER_BACKGROUND: Rgb = Rgb::BLACK;

/// Flattens every paragraph of an OCR block into word records with a
/// provisional text color.
pub fn extract_words(
    image: &RgbaImage,
    block: &DocumentBlock,
    color: &ColorConfig,
) -> Vec<WordDetection> {
    let mut words = Vec::new();
    for paragraph in &block.paragraphs {
        for word in &paragraph.words {
            let text = word.text();
            if text.trim().is_empty() {
                continue;
            }
            let Some(bbox) = envelope(&word.vertices) else {
                continue;
            };
            let text_color = estimate_word_color(
                image,
                &bbox,
                PLACEHOLDER_BACKGROUND,
                color.difference_threshold,
            );
            words.push(WordDetection {
                text,
                bbox,
                confidence: word.confidence.unwrap_or(block.confidence).clamp(0.0, 1.0),
                text_color,
            });
        }
    }
    words
}

/// Rebuilds visual lines inside each OCR block and assigns block ids from
/// `block_counter`.
pub fn assemble_blocks(
    image: &RgbaImage,
    pages: &[DocumentPage],
    cluster: &ClusterConfig,
    color: &ColorConfig,
    block_counter: &mut u32,
) -> Vec<Block> {
    let mut blocks = Vec::new();
    for page in pages {
        for document_block in &page.blocks {
            let words = extract_words(image, document_block, color);
            if words.is_empty() {
                continue;
            }
            let lines = group_words_into_lines(&words, cluster)
                .into_iter()
                .filter_map(|group| build_line(image, group, color))
                .collect::<Vec<_>>();
            *block_counter += 1;
            debug!(
                "assembled block {} with {} line(s)",
                *block_counter,
                lines.len()
            );
            blocks.push(Block {
                block_id: *block_counter,
                lines,
            });
        }
    }
    blocks
}

fn build_line(image: &RgbaImage, words: Vec<WordDetection>, color: &ColorConfig) -> Option<Line> {
    let bbox = words
        .iter()
        .map(|word| word.bbox)
        .reduce(|acc, bbox| union_bbox(&acc, &bbox))?;
    let background_color = color.line_background(image, &bbox);
    let words = recolor_words(image, &words, background_color, color);
    let text = words
        .iter()
        .map(|word| word.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    Some(Line {
        words,
        bbox,
        background_color,
        text,
    })
}

fn recolor_words(
    image: &RgbaImage,
    words: &[WordDetection],
    background: Rgb,
    color: &ColorConfig,
) -> Vec<WordDetection> {
    words
        .iter()
        .map(|word| {
            word.with_text_color(estimate_word_color(
                image,
                &word.bbox,
                background,
                color.difference_threshold,
            ))
        })
        .collect()
}
