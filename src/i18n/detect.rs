//! Locale detection and startup precedence.
//!
//! Detection order (first supported value wins):
//! 1. `APP_LOCALE` (explicit override, stands in for the browser language)
//! 2. `LC_ALL` / `LANG`
//! 3. System locale via `sys-locale`
//!
//! The persisted preference outranks all of these; see [`startup_language`].

use crate::i18n::Language;
use tracing::debug;

/// Detect the environment's preferred UI language, if it is supported.
pub fn detect_locale(override_locale: Option<&str>) -> Option<Language> {
    if let Some(language) = override_locale.and_then(Language::parse) {
        return Some(language);
    }

    if let Ok(lang) = std::env::var("LC_ALL").or_else(|_| std::env::var("LANG")) {
        if let Some(language) = Language::parse(&lang) {
            return Some(language);
        }
    }

    sys_locale::get_locale().and_then(|locale| Language::parse(&locale))
}

/// Pick the language applied to the translation engine at startup:
/// persisted preference, else detected locale, else the default.
///
/// An unsupported persisted value is ignored rather than trusted.
pub fn startup_language(preference: Option<&str>, detected: Option<Language>) -> Language {
    if let Some(language) = preference.and_then(Language::parse) {
        debug!("Using stored language preference '{}'", language);
        return language;
    }

    match detected {
        Some(language) => {
            debug!("Using detected language '{}'", language);
            language
        }
        None => Language::default_language(),
    }
}
