//! Language type: a validated UI locale.

use crate::i18n::{LanguageConfig, LanguageRegistry, LanguageStrings};
use anyhow::{bail, Result};
use std::fmt;

/// A supported UI locale.
///
/// Only codes present in the registry can be turned into a `Language`, so
/// every value maps to a string table and a font.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Language {
    code: &'static str,
}

impl Language {
    pub const ENGLISH: Language = Language { code: "en" };
    pub const HINDI: Language = Language { code: "hi" };
    pub const TELUGU: Language = Language { code: "te" };

    /// Create a Language from an exact, supported code.
    ///
    /// # Example
    /// ```ignore
    /// let telugu = Language::from_code("te")?;
    /// ```
    pub fn from_code(code: &str) -> Result<Language> {
        match LanguageRegistry::get().get_by_code(code) {
            Some(config) => Ok(Language { code: config.code }),
            None => bail!("Unknown language code: '{}'", code),
        }
    }

    /// Lenient lookup for codes coming from outside (browser, profile row,
    /// local storage, user input).
    ///
    /// Region and encoding suffixes are stripped (`hi-IN`, `te_IN.UTF-8`);
    /// anything still unsupported yields `None`.
    pub fn parse(raw: &str) -> Option<Language> {
        let normalized = normalize_code(raw);
        LanguageRegistry::get()
            .get_by_code(&normalized)
            .map(|config| Language { code: config.code })
    }

    /// Like [`Language::parse`], falling back to the default language.
    pub fn resolve(raw: &str) -> Language {
        Self::parse(raw).unwrap_or_else(Language::default_language)
    }

    /// The default language (first of the registry).
    pub fn default_language() -> Language {
        Language {
            code: LanguageRegistry::get().default_language().code,
        }
    }

    /// All supported languages, default first.
    pub fn all() -> Vec<Language> {
        LanguageRegistry::get()
            .list()
            .iter()
            .map(|config| Language { code: config.code })
            .collect()
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    /// Full configuration from the registry.
    ///
    /// # Panics
    /// Never in practice: a `Language` can only be built from registry codes.
    pub fn config(&self) -> &'static LanguageConfig {
        LanguageRegistry::get()
            .get_by_code(self.code)
            .expect("Language code should always be valid")
    }

    pub fn name(&self) -> &'static str {
        self.config().name
    }

    pub fn native_name(&self) -> &'static str {
        self.config().native_name
    }

    /// CSS font stack for this language.
    pub fn font_family(&self) -> &'static str {
        self.config().font_family
    }

    pub fn strings(&self) -> &'static LanguageStrings {
        self.config().strings
    }

    pub fn is_default(&self) -> bool {
        *self == Language::default_language()
    }
}

impl Default for Language {
    fn default() -> Self {
        Language::default_language()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code)
    }
}

/// Lowercase primary subtag: `hi-IN` → `hi`, `te_IN.UTF-8` → `te`.
pub fn normalize_code(raw: &str) -> String {
    raw.trim()
        .split(['.', '@'])
        .next()
        .unwrap_or_default()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}
