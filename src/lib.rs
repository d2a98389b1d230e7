use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

pub mod error;
pub mod languages;
pub mod logging;
pub mod ocr;
pub mod pipeline;
pub mod session;
pub mod settings;
#[cfg(test)]
mod test_util;
pub mod translator;

pub use error::{OverlayError, OverlayResult};
pub use pipeline::{OverlayOutput, OverlayPipeline};
pub use session::{CancelHandle, CaptureRegion, CaptureSession};
pub use translator::{CommandTranslator, GlossaryTranslator, Translate, TranslateFuture};

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub image: Option<String>,
    pub region: Option<CaptureRegion>,
    pub ocr_json: Option<String>,
    pub ocr_lang: Option<String>,
    pub translator_cmd: Option<String>,
    pub glossary: Option<String>,
    pub lang: Option<String>,
    pub source_lang: Option<String>,
    pub retranslate: Vec<String>,
    pub output: Option<String>,
    pub dump_blocks: bool,
    pub settings_path: Option<String>,
    pub show_enabled_languages: bool,
}

pub async fn run(config: Config) -> Result<String> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;

    if config.show_enabled_languages {
        return Ok(languages::LanguageRegistry::default().codes().join("\n"));
    }

    let image_path = config
        .image
        .as_deref()
        .ok_or_else(|| anyhow!("--image is required"))?;
    let screen = image::open(image_path)
        .with_context(|| format!("failed to open image: {}", image_path))?
        .to_rgba8();
    let mut session = match config.region {
        Some(region) => CaptureSession::from_screen(&screen, region)?,
        None => CaptureSession::from_image(screen)?,
    };

    let ocr: Arc<dyn ocr::DetectText> = match config.ocr_json.as_deref() {
        Some(path) => Arc::new(ocr::VisionJsonOcr::new(path)),
        None => Arc::new(ocr::TesseractOcr::new(
            config
                .ocr_lang
                .clone()
                .unwrap_or_else(|| settings.ocr_languages.clone()),
        )),
    };
    let translator = build_translator(&config)?;

    let mut pipeline = OverlayPipeline::new(ocr, translator);
    pipeline.cluster = settings.cluster.clone();
    pipeline.color = settings.color.clone();
    pipeline.fit = settings.fit.clone();
    pipeline.style = overlay_style(&settings);

    let source_lang = config
        .source_lang
        .clone()
        .unwrap_or_else(|| settings.source_lang.clone());
    let target_lang = config
        .lang
        .clone()
        .unwrap_or_else(|| settings.target_lang.clone());

    let output_path = PathBuf::from(config.output.as_deref().unwrap_or("overlay.png"));
    let first = pipeline
        .run(&mut session, &source_lang, &target_lang)
        .await?;
    save_image(&first, &output_path)?;

    let mut report = vec![format_output(&target_lang, &output_path, &first)];
    for lang in &config.retranslate {
        let path = sibling_path(&output_path, lang);
        let output = pipeline.retranslate(&session, &source_lang, lang).await?;
        save_image(&output, &path)?;
        report.push(format_output(lang, &path, &output));
    }

    if config.dump_blocks {
        let blocks = session.blocks().unwrap_or_default();
        report.push(
            serde_json::to_string_pretty(blocks).with_context(|| "failed to serialize blocks")?,
        );
    }

    Ok(report.join("\n"))
}

fn build_translator(config: &Config) -> Result<Arc<dyn Translate>> {
    match (config.translator_cmd.as_deref(), config.glossary.as_deref()) {
        (Some(_), Some(_)) => Err(anyhow!("use either --translator-cmd or --glossary, not both")),
        (Some(command), None) => Ok(Arc::new(CommandTranslator::parse(command)?)),
        (None, Some(path)) => Ok(Arc::new(GlossaryTranslator::load(Path::new(path))?)),
        (None, None) => Err(anyhow!(
            "no translator configured (use --translator-cmd or --glossary)"
        )),
    }
}

fn overlay_style(settings: &settings::Settings) -> ocr::OverlayStyle {
    let font_path = settings.overlay_font_path.as_deref().map(Path::new);
    let font_family = settings.overlay_font_family.as_deref();
    let (font_metrics, font_family) =
        match ocr::resolve_overlay_font(font_path, font_family, overlay_fallback_fonts()) {
            Ok(resolved) => (Some(resolved.metrics), Some(resolved.family)),
            Err(err) => {
                warn!("overlay font unavailable, using estimated metrics: {}", err);
                (None, settings.overlay_font_family.clone())
            }
        };
    ocr::OverlayStyle {
        outline_width: settings.overlay_outline_width,
        font_family,
        font_metrics,
    }
}

#[cfg(target_os = "macos")]
fn overlay_fallback_fonts() -> &'static [&'static str] {
    &["NotoSans", "Hiragino Sans", "sans-serif"]
}

#[cfg(target_os = "windows")]
fn overlay_fallback_fonts() -> &'static [&'static str] {
    &["NotoSans", "Arial Unicode", "sans-serif"]
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn overlay_fallback_fonts() -> &'static [&'static str] {
    &["NotoSans", "sans-serif"]
}

fn save_image(output: &OverlayOutput, path: &Path) -> Result<()> {
    output
        .image
        .save(path)
        .with_context(|| format!("failed to write overlay: {}", path.display()))?;
    info!("wrote {}", path.display());
    Ok(())
}

/// `out.png` + `ja` → `out.ja.png`
fn sibling_path(path: &Path, lang: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "overlay".to_string());
    let ext = path
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_else(|| "png".to_string());
    path.with_file_name(format!("{}.{}.{}", stem, lang, ext))
}

fn format_output(lang: &str, path: &Path, output: &OverlayOutput) -> String {
    let mut lines = vec![format!("{} -> {}", lang, path.display())];
    for line in &output.lines {
        lines.push(format!(
            "  [{}] {} => {}",
            line.block_id, line.original_text, line.translated_text
        ));
    }
    for block_id in &output.failed_blocks {
        lines.push(format!("  [{}] translation failed", block_id));
    }
    lines.join("\n")
}
