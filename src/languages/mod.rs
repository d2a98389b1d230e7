use std::fmt;

use crate::error::{OverlayError, OverlayResult};

/// Language codes accepted by the translation collaborator.
const SUPPORTED_LANGUAGES: &[&str] = &[
    "af", "ar", "az", "be", "bg", "bn", "bs", "ca", "ceb", "cs", "cy", "da", "de", "el", "en",
    "eo", "es", "et", "eu", "fa", "fi", "fil", "fr", "fy", "ga", "gd", "gl", "gu", "ha", "haw",
    "hi", "hmn", "hr", "ht", "hu", "hy", "id", "ig", "is", "it", "iw", "ja", "jv", "ka", "kk",
    "km", "kn", "ko", "ku", "ky", "la", "lb", "lo", "lt", "lv", "mg", "mi", "mk", "ml", "mn",
    "mr", "ms", "mt", "my", "ne", "nl", "no", "ny", "pa", "pl", "ps", "pt", "ro", "ru", "sd",
    "si", "sk", "sl", "sm", "sn", "so", "sq", "sr", "st", "su", "sv", "sw", "ta", "te", "tg",
    "th", "tl", "tr", "uk", "ur", "uz", "vi", "xh", "yi", "yo", "zh-CN", "zh-TW", "zu",
];

pub const AUTO_DETECT: &str = "auto";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageRole {
    Source,
    Target,
}

impl fmt::Display for LanguageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LanguageRole::Source => f.write_str("source"),
            LanguageRole::Target => f.write_str("target"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    codes: Vec<&'static str>,
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self {
            codes: SUPPORTED_LANGUAGES.to_vec(),
        }
    }
}

impl LanguageRegistry {
    pub fn codes(&self) -> &[&'static str] {
        &self.codes
    }

    /// Canonical spelling of `code`, if supported. Matching ignores case.
    pub fn canonical(&self, code: &str) -> Option<&'static str> {
        let code = code.trim();
        self.codes
            .iter()
            .copied()
            .find(|known| known.eq_ignore_ascii_case(code))
    }

    /// `auto` is only meaningful for the source side.
    pub fn validate(&self, code: &str, role: LanguageRole) -> OverlayResult<String> {
        if role == LanguageRole::Source && code.trim().eq_ignore_ascii_case(AUTO_DETECT) {
            return Ok(AUTO_DETECT.to_string());
        }
        self.canonical(code)
            .map(str::to_string)
            .ok_or_else(|| OverlayError::UnsupportedLanguage {
                code: code.to_string(),
                role,
            })
    }

    pub fn validate_pair(&self, source: &str, target: &str) -> OverlayResult<(String, String)> {
        let source = self.validate(source, LanguageRole::Source)?;
        let target = self.validate(target, LanguageRole::Target)?;
        Ok((source, target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_is_source_only() {
        let registry = LanguageRegistry::default();
        assert_eq!(
            registry.validate("auto", LanguageRole::Source).unwrap(),
            "auto"
        );
        let err = registry.validate("auto", LanguageRole::Target).unwrap_err();
        assert!(matches!(
            err,
            OverlayError::UnsupportedLanguage {
                role: LanguageRole::Target,
                ..
            }
        ));
    }

    #[test]
    fn codes_resolve_to_canonical_spelling() {
        let registry = LanguageRegistry::default();
        assert_eq!(registry.canonical("zh-cn"), Some("zh-CN"));
        assert_eq!(registry.canonical(" JA "), Some("ja"));
        assert_eq!(registry.canonical("xx"), None);
        assert!(registry.codes().contains(&"fil"));
    }

    #[test]
    fn pair_reports_the_failing_side() {
        let registry = LanguageRegistry::default();
        let err = registry.validate_pair("klingon", "en").unwrap_err();
        assert_eq!(err.to_string(), "unsupported source language: klingon");
        assert!(registry.validate_pair("auto", "de").is_ok());
    }
}
