use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ocr::{BackgroundMode, ClusterConfig, ColorConfig, FitConfig};

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub source_lang: String,
    pub target_lang: String,
    pub ocr_languages: String,
    pub cluster: ClusterConfig,
    pub fit: FitConfig,
    pub color: ColorConfig,
    pub overlay_font_path: Option<String>,
    pub overlay_font_family: Option<String>,
    pub overlay_outline_width: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source_lang: "auto".to_string(),
            target_lang: "en".to_string(),
            ocr_languages: "eng".to_string(),
            cluster: ClusterConfig::default(),
            fit: FitConfig::default(),
            color: ColorConfig::default(),
            overlay_font_path: None,
            overlay_font_family: None,
            overlay_outline_width: 2.0,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    translate: Option<TranslateSettings>,
    ocr: Option<OcrSettings>,
    cluster: Option<ClusterSettings>,
    fit: Option<FitSettings>,
    color: Option<ColorSettings>,
    overlay: Option<OverlaySettings>,
}

#[derive(Debug, Default, Deserialize)]
struct TranslateSettings {
    source_lang: Option<String>,
    target_lang: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OcrSettings {
    languages: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ClusterSettings {
    lookback: Option<usize>,
    min_overlap_ratio: Option<f32>,
    min_center_distance: Option<f32>,
    center_distance_factor: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct FitSettings {
    min_font_size: Option<f32>,
    max_font_size: Option<f32>,
    width_margin: Option<f32>,
    size_correction: Option<f32>,
    block_blend: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct ColorSettings {
    difference_threshold: Option<f32>,
    background: Option<String>,
    background_margin: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct OverlaySettings {
    font_path: Option<String>,
    font_family: Option<String>,
    outline_width: Option<f32>,
}

/// Embedded defaults, then `./settings.toml`, `./settings.local.toml`, the
/// same pair under `$HOME/.overlay-translator`, and finally `extra_path`.
pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    ensure_home_settings_file()?;

    let defaults: SettingsFile = toml::from_str(DEFAULT_SETTINGS_TOML)
        .with_context(|| "failed to parse built-in settings")?;
    settings.merge(defaults)?;

    let mut ordered_paths = vec![
        PathBuf::from("settings.toml"),
        PathBuf::from("settings.local.toml"),
    ];
    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }
    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings
                .merge(parsed)
                .with_context(|| format!("invalid settings: {}", path.display()))?;
        }
    }

    Ok(settings)
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) -> Result<()> {
        if let Some(translate) = incoming.translate {
            if let Some(lang) = non_blank(translate.source_lang) {
                self.source_lang = lang;
            }
            if let Some(lang) = non_blank(translate.target_lang) {
                self.target_lang = lang;
            }
        }
        if let Some(ocr) = incoming.ocr
            && let Some(languages) = non_blank(ocr.languages)
        {
            self.ocr_languages = languages;
        }
        if let Some(cluster) = incoming.cluster {
            if let Some(lookback) = cluster.lookback
                && lookback > 0
            {
                self.cluster.lookback = lookback;
            }
            if let Some(ratio) = cluster.min_overlap_ratio {
                self.cluster.min_overlap_ratio = ratio;
            }
            if let Some(distance) = cluster.min_center_distance {
                self.cluster.min_center_distance = distance;
            }
            if let Some(factor) = cluster.center_distance_factor {
                self.cluster.center_distance_factor = factor;
            }
        }
        if let Some(fit) = incoming.fit {
            if let Some(size) = fit.min_font_size
                && size > 0.0
            {
                self.fit.min_size = size;
            }
            if let Some(size) = fit.max_font_size
                && size > 0.0
            {
                self.fit.max_size = size;
            }
            if let Some(margin) = fit.width_margin {
                self.fit.width_margin = margin;
            }
            if let Some(correction) = fit.size_correction {
                self.fit.size_correction = correction;
            }
            if let Some(blend) = fit.block_blend {
                self.fit.block_blend = blend.clamp(0.0, 1.0);
            }
        }
        if let Some(color) = incoming.color {
            if let Some(threshold) = color.difference_threshold {
                self.color.difference_threshold = threshold;
            }
            let margin = color.background_margin.or(match self.color.background {
                BackgroundMode::Dominant { margin } => Some(margin),
                BackgroundMode::Border => None,
            });
            match color.background.as_deref().map(str::trim) {
                Some("border") => self.color.background = BackgroundMode::Border,
                Some("dominant") => {
                    self.color.background = BackgroundMode::Dominant {
                        margin: margin.unwrap_or(4),
                    }
                }
                Some(other) => return Err(anyhow!("unknown background mode '{}'", other)),
                None => {
                    if let (BackgroundMode::Dominant { .. }, Some(margin)) =
                        (self.color.background, margin)
                    {
                        self.color.background = BackgroundMode::Dominant { margin };
                    }
                }
            }
        }
        if let Some(overlay) = incoming.overlay {
            if let Some(path) = non_blank(overlay.font_path) {
                self.overlay_font_path = Some(path);
            }
            if let Some(family) = non_blank(overlay.font_family) {
                self.overlay_font_family = Some(family);
            }
            if let Some(width) = overlay.outline_width
                && width >= 0.0
            {
                self.overlay_outline_width = width;
            }
        }
        Ok(())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".overlay-translator"))
        }
    })
}
