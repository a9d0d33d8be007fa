//! Slash-command shell standing in for the portal's page views.
//!
//! Every reply is rendered through the translation engine at the moment it
//! is produced, so a `/language` change shows up in its own confirmation.

use crate::app::App;
use crate::i18n::Language;
use crate::language_sync::LanguageChange;
use crate::routes::{GateDecision, Navigator, Route};
use crate::session::{SessionState, SignUpOutcome};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { email: String, password: String },
    Register { email: String, password: String, full_name: String },
    Logout,
    /// `/language` alone shows the settings, `/language <code>` changes them.
    Language(Option<String>),
    Go(String),
    Status,
    Help,
    /// Known command with missing arguments; holds the usage string key.
    Usage(&'static str),
    Unknown(String),
}

impl Command {
    /// Parse one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Option<Command> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let (name, rest) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line, ""),
        };
        let mut args = rest.split_whitespace();

        let command = match name {
            "/login" => match (args.next(), args.next()) {
                (Some(email), Some(password)) => Command::Login {
                    email: email.to_string(),
                    password: password.to_string(),
                },
                _ => Command::Usage("shell.usageLogin"),
            },
            "/register" => {
                let email = args.next();
                let password = args.next();
                let full_name = args.collect::<Vec<_>>().join(" ");
                match (email, password) {
                    (Some(email), Some(password)) if !full_name.is_empty() => Command::Register {
                        email: email.to_string(),
                        password: password.to_string(),
                        full_name,
                    },
                    _ => Command::Usage("shell.usageRegister"),
                }
            }
            "/logout" => Command::Logout,
            "/language" => Command::Language(args.next().map(str::to_string)),
            "/go" => match args.next() {
                Some(path) => Command::Go(path.to_string()),
                None => Command::Usage("shell.usageGo"),
            },
            "/status" => Command::Status,
            "/help" | "/start" => Command::Help,
            _ => Command::Unknown(line.to_string()),
        };
        Some(command)
    }
}

pub struct Shell {
    app: App,
    navigator: Navigator,
}

impl Shell {
    pub fn new(app: App) -> Self {
        Self {
            app,
            navigator: Navigator::new(),
        }
    }

    pub fn app(&self) -> &App {
        &self.app
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    /// Handle one input line, returning the reply (if any).
    pub async fn handle_line(&mut self, line: &str) -> Option<String> {
        let command = Command::parse(line)?;
        debug!("Shell command: {:?}", command);
        Some(self.execute(command).await)
    }

    pub async fn execute(&mut self, command: Command) -> String {
        match command {
            Command::Login { email, password } => {
                match self.app.session().sign_in(&email, &password).await {
                    Ok(()) => self.after_sign_in(),
                    Err(e) => self.t_with("shell.authFailed", &[("error", e.to_string().as_str())]),
                }
            }
            Command::Register {
                email,
                password,
                full_name,
            } => {
                let locale = self.app.engine().language().code();
                match self
                    .app
                    .session()
                    .sign_up(&email, &password, &full_name, locale)
                    .await
                {
                    Ok(SignUpOutcome::SignedIn) => self.after_sign_in(),
                    Ok(SignUpOutcome::ConfirmationRequired) => self.t("auth.checkEmail"),
                    Err(e) => self.t_with("shell.authFailed", &[("error", e.to_string().as_str())]),
                }
            }
            Command::Logout => {
                self.app.session().sign_out().await;
                self.navigator
                    .navigate(Route::Home.path(), SessionState::Unauthenticated);
                self.t("auth.signOutSuccess")
            }
            Command::Language(None) => {
                let current = self.app.engine().language();
                self.t_with(
                    "shell.languageSettings",
                    &[
                        ("current", describe(current).as_str()),
                        ("options", language_options().as_str()),
                    ],
                )
            }
            Command::Language(Some(code)) => self.change_language(&code).await,
            Command::Go(path) => self.go(&path),
            Command::Status => match self.app.session().session() {
                Some(session) => {
                    let language = describe(self.app.engine().language());
                    self.t_with(
                        "shell.statusSignedIn",
                        &[("email", session.email.as_str()), ("language", language.as_str())],
                    )
                }
                None => self.t("shell.statusSignedOut"),
            },
            Command::Help => self.t("shell.help"),
            Command::Usage(key) => self.t(key),
            Command::Unknown(_) => self.t("shell.unknownCommand"),
        }
    }

    async fn change_language(&mut self, code: &str) -> String {
        // Typos are rejected here; the controller itself falls back to English
        if Language::parse(code).is_none() {
            return self.t_with("shell.languageInvalid", &[("options", language_options().as_str())]);
        }

        let outcome = self.app.language().change_language(code).await;
        let current = describe(self.app.engine().language());
        let mut reply = self.t_with("shell.languageChanged", &[("language", current.as_str())]);
        if matches!(outcome, LanguageChange::SyncFailed { .. }) {
            reply.push('\n');
            reply.push_str(&self.t("shell.languageSyncFailed"));
        }
        reply
    }

    fn go(&mut self, path: &str) -> String {
        let state = self.app.session().state();
        match self.navigator.navigate(path, state) {
            GateDecision::Render(Route::NotFound) => self.t_with("shell.notFound", &[("path", path)]),
            GateDecision::Render(route) => self.page_opened(route),
            GateDecision::Loading => self.t("common.loading"),
            GateDecision::RedirectToLogin { from } => {
                self.t_with("shell.redirectLogin", &[("path", from.as_str())])
            }
        }
    }

    fn after_sign_in(&mut self) -> String {
        let target = self.navigator.resume_after_login();
        let route = Route::from_path(&target);
        format!("{}\n{}", self.t("auth.signInSuccess"), self.page_opened(route))
    }

    fn page_opened(&self, route: Route) -> String {
        let page = self.t(route.title_key());
        self.t_with("shell.navigated", &[("page", page.as_str())])
    }

    fn t(&self, key: &str) -> String {
        self.app.engine().t(key).to_string()
    }

    fn t_with(&self, key: &str, args: &[(&str, &str)]) -> String {
        self.app.engine().t_with(key, args)
    }
}

fn describe(language: Language) -> String {
    format!("{} ({})", language.native_name(), language.code())
}

fn language_options() -> String {
    Language::all()
        .iter()
        .map(|language| format!("{} ({})", language.native_name(), language.code()))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Parser Tests ====================

    #[test]
    fn test_parse_login() {
        assert_eq!(
            Command::parse("/login asha@example.com s3cret"),
            Some(Command::Login {
                email: "asha@example.com".to_string(),
                password: "s3cret".to_string(),
            })
        );
        assert_eq!(
            Command::parse("/login asha@example.com"),
            Some(Command::Usage("shell.usageLogin"))
        );
    }

    #[test]
    fn test_parse_register_keeps_full_name() {
        assert_eq!(
            Command::parse("/register ravi@example.com pw Ravi  Kumar"),
            Some(Command::Register {
                email: "ravi@example.com".to_string(),
                password: "pw".to_string(),
                full_name: "Ravi Kumar".to_string(),
            })
        );
        assert_eq!(
            Command::parse("/register ravi@example.com pw"),
            Some(Command::Usage("shell.usageRegister"))
        );
    }

    #[test]
    fn test_parse_language_with_and_without_argument() {
        assert_eq!(Command::parse("/language"), Some(Command::Language(None)));
        assert_eq!(
            Command::parse("/language   te  "),
            Some(Command::Language(Some("te".to_string())))
        );
    }

    #[test]
    fn test_parse_go_and_misc() {
        assert_eq!(Command::parse("/go /trading"), Some(Command::Go("/trading".to_string())));
        assert_eq!(Command::parse("/go"), Some(Command::Usage("shell.usageGo")));
        assert_eq!(Command::parse("/status"), Some(Command::Status));
        assert_eq!(Command::parse("/start"), Some(Command::Help));
        assert_eq!(Command::parse("   "), None);
        assert!(matches!(Command::parse("hello"), Some(Command::Unknown(_))));
    }

    #[test]
    fn test_language_options_lists_every_language() {
        let options = language_options();
        for language in Language::all() {
            assert!(options.contains(language.code()));
        }
    }
}
