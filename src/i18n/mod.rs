//! Internationalization (i18n) for the portal UI.
//!
//! # Architecture
//!
//! - `registry`: Single source of truth for supported locales, their fonts and string tables
//! - `language`: Validated `Language` type with strict and lenient constructors
//! - `strings`: Localized UI strings per language
//! - `detect`: Environment/system locale detection and startup precedence
//! - `engine`: The active locale, observable, with `t(key)` lookup
//!
//! # Example
//!
//! ```rust,ignore
//! use bond_portal::i18n::{Language, TranslationEngine};
//!
//! let engine = TranslationEngine::new(Language::resolve("hi-IN"));
//! assert_eq!(engine.t("common.dashboard"), "डैशबोर्ड");
//! ```

mod detect;
mod engine;
mod language;
mod registry;
mod strings;

pub use detect::{detect_locale, startup_language};
pub use engine::TranslationEngine;
pub use language::{normalize_code, Language};
pub use registry::{LanguageConfig, LanguageRegistry};
pub use strings::LanguageStrings;

/// Everything a view needs to render in one locale.
#[derive(Debug, Clone, Copy)]
pub struct LocaleResources {
    pub language: Language,
    pub strings: &'static LanguageStrings,
    pub font_family: &'static str,
}

/// Locale Resolver: map any locale code to its string table and font.
///
/// Pure; unknown codes resolve to the default language.
pub fn resolve_locale(code: &str) -> LocaleResources {
    let language = Language::resolve(code);
    LocaleResources {
        language,
        strings: language.strings(),
        font_family: language.font_family(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_locale_supported() {
        let resources = resolve_locale("te");
        assert_eq!(resources.language, Language::TELUGU);
        assert_eq!(resources.strings.get("common.welcome"), Some("స్వాగతం"));
        assert!(resources.font_family.contains("Noto Sans Telugu"));
    }

    #[test]
    fn test_resolve_locale_unknown_uses_default() {
        let resources = resolve_locale("de-DE");
        assert_eq!(resources.language, Language::ENGLISH);
        assert_eq!(resources.font_family, "Inter, system-ui, sans-serif");
    }
}
