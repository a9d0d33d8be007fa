//! Language registry: single source of truth for the supported UI locales.
//!
//! The registry is a lazily initialized singleton (`OnceLock`). Its order is
//! significant: the first entry is the default locale that every unknown or
//! unsupported code falls back to.

use crate::i18n::strings::{ENGLISH_STRINGS, HINDI_STRINGS, LanguageStrings, TELUGU_STRINGS};
use std::sync::OnceLock;

/// Configuration for a supported UI locale.
#[derive(Debug, Clone)]
pub struct LanguageConfig {
    /// ISO 639-1 language code (e.g., "en", "hi")
    pub code: &'static str,

    /// English name of the language (e.g., "Hindi")
    pub name: &'static str,

    /// Native name of the language (e.g., "हिंदी")
    pub native_name: &'static str,

    /// CSS font stack used to render this language
    pub font_family: &'static str,

    /// UI string table
    pub strings: &'static LanguageStrings,
}

/// Global language registry singleton.
pub struct LanguageRegistry {
    languages: Vec<LanguageConfig>,
}

static REGISTRY: OnceLock<LanguageRegistry> = OnceLock::new();

impl LanguageRegistry {
    /// Get the global language registry instance.
    pub fn get() -> &'static LanguageRegistry {
        REGISTRY.get_or_init(|| LanguageRegistry {
            languages: default_languages(),
        })
    }

    /// Get a language configuration by its exact code.
    pub fn get_by_code(&self, code: &str) -> Option<&LanguageConfig> {
        self.languages.iter().find(|lang| lang.code == code)
    }

    /// All supported languages, default first.
    pub fn list(&self) -> &[LanguageConfig] {
        &self.languages
    }

    /// The default language (first of the enumerated set).
    pub fn default_language(&self) -> &LanguageConfig {
        // default_languages() is never empty
        &self.languages[0]
    }

    /// Check if a language code is supported.
    pub fn is_supported(&self, code: &str) -> bool {
        self.get_by_code(code).is_some()
    }
}

fn default_languages() -> Vec<LanguageConfig> {
    vec![
        LanguageConfig {
            code: "en",
            name: "English",
            native_name: "English",
            font_family: "Inter, system-ui, sans-serif",
            strings: &ENGLISH_STRINGS,
        },
        LanguageConfig {
            code: "hi",
            name: "Hindi",
            native_name: "हिंदी",
            font_family: "\"Noto Sans Devanagari\", system-ui, sans-serif",
            strings: &HINDI_STRINGS,
        },
        LanguageConfig {
            code: "te",
            name: "Telugu",
            native_name: "తెలుగు",
            font_family: "\"Noto Sans Telugu\", system-ui, sans-serif",
            strings: &TELUGU_STRINGS,
        },
    ]
}
