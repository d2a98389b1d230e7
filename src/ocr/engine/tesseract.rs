use anyhow::{Context, Result, anyhow};
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};

use super::parse::parse_hocr_pages;
use super::preprocess::{ocr_scale, preprocess_for_ocr};
use super::{DetectFuture, DetectText, DocumentPage};

/// Local document OCR through the `tesseract` CLI's hOCR output.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    languages: String,
}

impl TesseractOcr {
    pub fn new(languages: impl Into<String>) -> Self {
        Self {
            languages: languages.into(),
        }
    }
}

impl DetectText for TesseractOcr {
    fn detect_document_text<'a>(&'a self, image_png: &'a [u8]) -> DetectFuture<'a> {
        Box::pin(async move {
            let image = image::load_from_memory(image_png)
                .with_context(|| "failed to decode image for OCR")?
                .to_rgba8();
            let scale = ocr_scale(image.width());
            let languages = normalize_ocr_languages(&self.languages).await?;

            let mut tmp = tempfile::Builder::new()
                .suffix(".png")
                .tempfile()
                .with_context(|| "failed to create temp file for OCR")?;
            preprocess_for_ocr(&image, scale)
                .write_to(&mut tmp, image::ImageFormat::Png)
                .with_context(|| "failed to write temp image for OCR")?;
            tmp.flush().ok();

            let hocr = run_tesseract_hocr(tmp.path(), &languages).await?;
            let pages = parse_hocr_pages(&hocr);
            debug!("tesseract returned {} page(s) at scale {}", pages.len(), scale);
            Ok(scale_pages(pages, scale))
        })
    }
}

pub async fn list_tesseract_languages() -> Result<Vec<String>> {
    let output = tokio::process::Command::new("tesseract")
        .arg("--list-langs")
        .kill_on_drop(true)
        .output()
        .await
        .with_context(|| "failed to run tesseract --list-langs")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("tesseract --list-langs failed: {}", stderr.trim()));
    }
    Ok(parse_language_list(&String::from_utf8_lossy(&output.stdout)))
}

// First line is the "List of available languages" header.
fn parse_language_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}

async fn normalize_ocr_languages(requested: &str) -> Result<String> {
    let trimmed = requested.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("ocr languages is empty"));
    }

    let available = match list_tesseract_languages().await {
        Ok(list) => list,
        Err(_) => return Ok(trimmed.to_string()),
    };

    let mut chosen = Vec::new();
    let mut missing = Vec::new();
    for raw in trimmed.split(['+', ',', ' ']) {
        let lang = raw.trim();
        if lang.is_empty() {
            continue;
        }
        if available.iter().any(|value| value == lang) {
            chosen.push(lang.to_string());
        } else {
            missing.push(lang.to_string());
        }
    }

    if chosen.is_empty() {
        return Err(anyhow!(
            "ocr language(s) not available: {} (available: {})",
            missing.join(", "),
            available.join(", ")
        ));
    }
    if !missing.is_empty() {
        warn!(
            "ocr language(s) not available: {} (available: {})",
            missing.join(", "),
            available.join(", ")
        );
    }

    Ok(chosen.join("+"))
}

async fn run_tesseract_hocr(path: &Path, languages: &str) -> Result<String> {
    let output = tokio::process::Command::new("tesseract")
        .arg(path)
        .arg("stdout")
        .arg("-l")
        .arg(languages)
        .arg("--oem")
        .arg("1")
        .arg("--psm")
        .arg("3")
        .arg("--dpi")
        .arg("300")
        .arg("hocr")
        .kill_on_drop(true)
        .output()
        .await
        .with_context(|| "failed to run tesseract (is it installed?)")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("tesseract failed: {}", stderr.trim()));
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

fn scale_pages(mut pages: Vec<DocumentPage>, scale: u32) -> Vec<DocumentPage> {
    if scale <= 1 {
        return pages;
    }
    let scale = scale as f32;
    for page in &mut pages {
        for block in &mut page.blocks {
            for paragraph in &mut block.paragraphs {
                for word in &mut paragraph.words {
                    for vertex in &mut word.vertices {
                        vertex.x = (vertex.x as f32 / scale).round() as i32;
                        vertex.y = (vertex.y as f32 / scale).round() as i32;
                    }
                }
            }
        }
    }
    pages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::engine::{DocumentBlock, DocumentParagraph, DocumentWord, Vertex};

    #[test]
    fn vertices_return_to_capture_pixels() {
        let pages = vec![DocumentPage {
            blocks: vec![DocumentBlock {
                confidence: 1.0,
                paragraphs: vec![DocumentParagraph {
                    words: vec![DocumentWord {
                        symbols: vec!["a".to_string()],
                        vertices: vec![Vertex { x: 30, y: 61 }, Vertex { x: 90, y: 121 }],
                        confidence: None,
                    }],
                }],
            }],
        }];
        let scaled = scale_pages(pages, 3);
        let vertices = &scaled[0].blocks[0].paragraphs[0].words[0].vertices;
        assert_eq!(vertices[0], Vertex { x: 10, y: 20 });
        assert_eq!(vertices[1], Vertex { x: 30, y: 40 });
    }

    #[tokio::test]
    async fn blank_language_list_is_rejected() {
        assert!(normalize_ocr_languages("  ").await.is_err());
    }

    #[test]
    fn language_list_skips_the_header() {
        let stdout = "List of available languages (3):\neng\n\njpn\nosd\n";
        assert_eq!(parse_language_list(stdout), vec!["eng", "jpn", "osd"]);
    }
}
