use thiserror::Error;

use crate::languages::LanguageRole;

/// Failures surfaced by a capture/translate/render pass.
#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("invalid capture region: {width}x{height}")]
    InvalidRegion { width: i64, height: i64 },

    #[error("no text detected in the capture")]
    NoTextDetected,

    #[error("translation failed for block {block_id}: {source}")]
    TranslationFailure {
        block_id: u32,
        source: anyhow::Error,
    },

    #[error("unsupported {role} language: {code}")]
    UnsupportedLanguage { code: String, role: LanguageRole },

    #[error("capture session was closed")]
    Cancelled,

    #[error("OCR failed: {0}")]
    Ocr(#[source] anyhow::Error),

    #[error("render failed: {0}")]
    Render(#[source] anyhow::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type OverlayResult<T> = std::result::Result<T, OverlayError>;
