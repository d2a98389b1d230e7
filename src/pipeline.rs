use futures_util::future::{Abortable, join_all};
use image::RgbaImage;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{OverlayError, OverlayResult};
use crate::languages::LanguageRegistry;
use crate::ocr::{
    Block, ClusterConfig, ColorConfig, DetectText, FitConfig, OverlayStyle, TranslatedLine,
    assemble_blocks, encode_png, render_overlay, split_translated_block,
};
use crate::session::CaptureSession;
use crate::translator::Translate;

/// Result of one translation pass over a session's blocks.
#[derive(Debug, Clone)]
pub struct OverlayOutput {
    pub image: RgbaImage,
    pub lines: Vec<TranslatedLine>,
    /// Blocks whose translation failed; their original text stays visible.
    pub failed_blocks: Vec<u32>,
}

/// OCR → block assembly → per-block translation → redistribution → fitting → compositing.
#[derive(Clone)]
pub struct OverlayPipeline {
    ocr: Arc<dyn DetectText>,
    translator: Arc<dyn Translate>,
    registry: LanguageRegistry,
    pub cluster: ClusterConfig,
    pub color: ColorConfig,
    pub fit: FitConfig,
    pub style: OverlayStyle,
}

impl OverlayPipeline {
    pub fn new(ocr: Arc<dyn DetectText>, translator: Arc<dyn Translate>) -> Self {
        Self {
            ocr,
            translator,
            registry: LanguageRegistry::default(),
            cluster: ClusterConfig::default(),
            color: ColorConfig::default(),
            fit: FitConfig::default(),
            style: OverlayStyle::default(),
        }
    }

    /// Full pass. OCR only runs when the session has no cached blocks yet.
    pub async fn run(
        &self,
        session: &mut CaptureSession,
        source_lang: &str,
        target_lang: &str,
    ) -> OverlayResult<OverlayOutput> {
        let (source, target) = self.registry.validate_pair(source_lang, target_lang)?;
        if session.blocks().is_none() {
            self.detect(session).await?;
        }
        self.translate_and_render(session, &source, &target).await
    }

    /// Re-runs translation and rendering against the cached blocks.
    pub async fn retranslate(
        &self,
        session: &CaptureSession,
        source_lang: &str,
        target_lang: &str,
    ) -> OverlayResult<OverlayOutput> {
        let (source, target) = self.registry.validate_pair(source_lang, target_lang)?;
        if session.blocks().is_none() {
            return Err(OverlayError::NoTextDetected);
        }
        self.translate_and_render(session, &source, &target).await
    }

    /// Runs OCR over the capture and caches the assembled blocks.
    pub async fn detect(&self, session: &mut CaptureSession) -> OverlayResult<usize> {
        let png = encode_png(session.region_image()).map_err(OverlayError::Render)?;
        let (registration, _work) = session.register()?;
        let pages = Abortable::new(self.ocr.detect_document_text(&png), registration)
            .await
            .map_err(|_| OverlayError::Cancelled)?
            .map_err(OverlayError::Ocr)?;

        let (image, block_counter) = session.image_and_counter();
        let blocks = assemble_blocks(image, &pages, &self.cluster, &self.color, block_counter);
        if blocks.is_empty() {
            return Err(OverlayError::NoTextDetected);
        }
        info!("detected {} block(s)", blocks.len());
        let count = blocks.len();
        session.store_blocks(blocks);
        Ok(count)
    }

    async fn translate_and_render(
        &self,
        session: &CaptureSession,
        source: &str,
        target: &str,
    ) -> OverlayResult<OverlayOutput> {
        let blocks = session.blocks().ok_or(OverlayError::NoTextDetected)?;
        let (registration, _work) = session.register()?;
        let pending = join_all(blocks.iter().map(|block| async move {
            (block.block_id, self.translate_block(block, source, target).await)
        }));
        let results = Abortable::new(pending, registration)
            .await
            .map_err(|_| OverlayError::Cancelled)?;

        let mut lines = Vec::new();
        let mut failed_blocks = Vec::new();
        for (block_id, result) in results {
            match result {
                Ok(translated) => lines.extend(translated),
                Err(err) => {
                    let err = OverlayError::TranslationFailure {
                        block_id,
                        source: err,
                    };
                    warn!("{}", err);
                    failed_blocks.push(block_id);
                }
            }
        }

        let image = render_overlay(session.region_image(), &lines, &self.style, &self.fit)
            .map_err(OverlayError::Render)?;
        Ok(OverlayOutput {
            image,
            lines,
            failed_blocks,
        })
    }

    /// Single-line blocks are sent as-is; longer blocks are joined with
    /// newlines and the translation is spread back over the lines.
    async fn translate_block(
        &self,
        block: &Block,
        source: &str,
        target: &str,
    ) -> anyhow::Result<Vec<TranslatedLine>> {
        let per_line = match block.lines.as_slice() {
            [] => Vec::new(),
            [line] => vec![self.translate_text(&line.text, source, target).await?],
            lines => {
                let translated = self.translate_text(&block.text(), source, target).await?;
                split_translated_block(&translated, lines)
            }
        };
        debug!("block {} translated into {} line(s)", block.block_id, per_line.len());
        Ok(block
            .lines
            .iter()
            .zip(per_line)
            .map(|(line, text)| TranslatedLine::from_line(line, text, block.block_id))
            .collect())
    }

    async fn translate_text(&self, text: &str, source: &str, target: &str) -> anyhow::Result<String> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }
        let translated = self.translator.translate(text, source, target).await?;
        Ok(html_escape::decode_html_entities(&translated).into_owned())
    }
}
