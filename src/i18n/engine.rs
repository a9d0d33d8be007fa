//! Translation engine: the active UI locale and string lookup.
//!
//! The active language lives in a `tokio::sync::watch` cell. Setting it is
//! synchronous and immediately visible to `t()`; views that want to
//! re-render (or re-apply the font) hold a receiver from `subscribe()`.

use crate::i18n::Language;
use tokio::sync::watch;
use tracing::info;

#[derive(Clone)]
pub struct TranslationEngine {
    current: watch::Sender<Language>,
}

impl TranslationEngine {
    pub fn new(initial: Language) -> Self {
        let (current, _) = watch::channel(initial);
        Self { current }
    }

    /// The active language.
    pub fn language(&self) -> Language {
        *self.current.borrow()
    }

    /// Switch the active language. Returns `false` if it was already active.
    pub fn set_language(&self, language: Language) -> bool {
        let changed = self.current.send_if_modified(|current| {
            if *current == language {
                false
            } else {
                *current = language;
                true
            }
        });
        if changed {
            info!(
                "UI language is now '{}' (font: {})",
                language,
                language.font_family()
            );
        }
        changed
    }

    /// Font stack for the active language.
    pub fn font_family(&self) -> &'static str {
        self.language().font_family()
    }

    /// Observe language changes.
    pub fn subscribe(&self) -> watch::Receiver<Language> {
        self.current.subscribe()
    }

    /// Look up a dotted key in the active language.
    ///
    /// Falls back to the default language, then to the key itself, so a
    /// missing entry never renders as an empty string.
    pub fn t<'a>(&self, key: &'a str) -> &'a str {
        let found: Option<&'static str> = self
            .language()
            .strings()
            .get(key)
            .or_else(|| Language::default_language().strings().get(key));
        match found {
            Some(text) => text,
            None => key,
        }
    }

    /// Look up `key` and substitute `{name}` placeholders.
    pub fn t_with(&self, key: &str, args: &[(&str, &str)]) -> String {
        let mut text = self.t(key).to_string();
        for (name, value) in args {
            text = text.replace(&format!("{{{}}}", name), value);
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_language_is_immediately_visible() {
        let engine = TranslationEngine::new(Language::ENGLISH);
        assert_eq!(engine.t("common.dashboard"), "Dashboard");

        assert!(engine.set_language(Language::TELUGU));
        assert_eq!(engine.language(), Language::TELUGU);
        assert_eq!(engine.t("common.dashboard"), "డాష్‌బోర్డ్");
        assert!(engine.font_family().contains("Telugu"));
    }

    #[test]
    fn test_set_same_language_reports_unchanged() {
        let engine = TranslationEngine::new(Language::HINDI);
        assert!(!engine.set_language(Language::HINDI));
    }

    #[test]
    fn test_missing_key_falls_back_to_key() {
        let engine = TranslationEngine::new(Language::HINDI);
        assert_eq!(engine.t("common.doesNotExist"), "common.doesNotExist");
    }

    #[test]
    fn test_t_with_substitutes_placeholders() {
        let engine = TranslationEngine::new(Language::ENGLISH);
        let text = engine.t_with("shell.redirectLogin", &[("path", "/dashboard")]);
        assert_eq!(text, "Please sign in to open /dashboard");
    }

    #[tokio::test]
    async fn test_subscribers_observe_changes() {
        let engine = TranslationEngine::new(Language::ENGLISH);
        let mut rx = engine.subscribe();

        engine.set_language(Language::HINDI);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), Language::HINDI);

        // A no-op set does not wake observers
        engine.set_language(Language::HINDI);
        assert!(!rx.has_changed().unwrap());
    }
}
