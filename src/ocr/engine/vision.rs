use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::path::PathBuf;

use super::{
    DetectFuture, DetectText, DocumentBlock, DocumentPage, DocumentParagraph, DocumentWord, Vertex,
};

/// Replays a saved `DetectDocumentText` response instead of calling the service.
#[derive(Debug, Clone)]
pub struct VisionJsonOcr {
    path: PathBuf,
}

impl VisionJsonOcr {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DetectText for VisionJsonOcr {
    fn detect_document_text<'a>(&'a self, _image_png: &'a [u8]) -> DetectFuture<'a> {
        Box::pin(async move {
            let raw = tokio::fs::read_to_string(&self.path)
                .await
                .with_context(|| format!("failed to read OCR response: {}", self.path.display()))?;
            parse_vision_response(&raw)
                .with_context(|| format!("failed to parse OCR response: {}", self.path.display()))
        })
    }
}

/// Accepts a batch (`responses[]`), a single response (`fullTextAnnotation`)
/// or a bare text annotation (`pages`).
pub fn parse_vision_response(raw: &str) -> Result<Vec<DocumentPage>> {
    let payload: VisionPayload = serde_json::from_str(raw)?;
    let annotations = match payload {
        VisionPayload::Batch { responses } => {
            let mut annotations = Vec::new();
            for response in responses {
                if let Some(error) = response.error {
                    return Err(anyhow!(
                        "OCR service error: {}",
                        error.message.unwrap_or_else(|| "unknown".to_string())
                    ));
                }
                annotations.extend(response.full_text_annotation);
            }
            annotations
        }
        VisionPayload::Single {
            full_text_annotation,
        } => vec![full_text_annotation],
        VisionPayload::Annotation(annotation) => vec![annotation],
    };
    Ok(annotations
        .into_iter()
        .flat_map(|annotation| annotation.pages)
        .map(convert_page)
        .collect())
}

fn convert_page(page: Page) -> DocumentPage {
    DocumentPage {
        blocks: page
            .blocks
            .into_iter()
            .map(|block| DocumentBlock {
                confidence: block.confidence.unwrap_or(1.0),
                paragraphs: block
                    .paragraphs
                    .into_iter()
                    .map(|paragraph| DocumentParagraph {
                        words: paragraph.words.into_iter().map(convert_word).collect(),
                    })
                    .collect(),
            })
            .collect(),
    }
}

fn convert_word(word: Word) -> DocumentWord {
    DocumentWord {
        symbols: word.symbols.into_iter().map(|symbol| symbol.text).collect(),
        vertices: word
            .bounding_box
            .map(|bbox| {
                bbox.vertices
                    .into_iter()
                    .map(|v| Vertex { x: v.x, y: v.y })
                    .collect()
            })
            .unwrap_or_default(),
        confidence: word.confidence,
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum VisionPayload {
    Batch {
        responses: Vec<AnnotateResponse>,
    },
    Single {
        #[serde(rename = "fullTextAnnotation")]
        full_text_annotation: TextAnnotation,
    },
    Annotation(TextAnnotation),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateResponse {
    #[serde(default)]
    full_text_annotation: Option<TextAnnotation>,
    #[serde(default)]
    error: Option<Status>,
}

#[derive(Deserialize)]
struct Status {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct TextAnnotation {
    pages: Vec<Page>,
}

#[derive(Deserialize)]
struct Page {
    #[serde(default)]
    blocks: Vec<Block>,
}

#[derive(Deserialize)]
struct Block {
    #[serde(default)]
    paragraphs: Vec<Paragraph>,
    #[serde(default)]
    confidence: Option<f32>,
}

#[derive(Deserialize)]
struct Paragraph {
    #[serde(default)]
    words: Vec<Word>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Word {
    #[serde(default)]
    bounding_box: Option<BoundingPoly>,
    #[serde(default)]
    symbols: Vec<Symbol>,
    #[serde(default)]
    confidence: Option<f32>,
}

#[derive(Deserialize)]
struct BoundingPoly {
    #[serde(default)]
    vertices: Vec<RawVertex>,
}

// The service omits zero coordinates.
#[derive(Deserialize)]
struct RawVertex {
    #[serde(default)]
    x: i32,
    #[serde(default)]
    y: i32,
}

#[derive(Deserialize)]
struct Symbol {
    #[serde(default)]
    text: String,
}
