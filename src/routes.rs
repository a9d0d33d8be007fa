//! Route table and the Protected Route Gate.
//!
//! The gate is a pure function of the session state and the requested path.
//! `Navigator` layers the stateful part on top: the current location and the
//! path a redirected visitor should return to after signing in.

use crate::session::SessionState;
use std::fmt;
use tracing::debug;

pub const LOGIN_PATH: &str = "/auth/login";
pub const DEFAULT_RETURN_PATH: &str = "/dashboard";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    Login,
    Register,
    Dashboard,
    Trading,
    Portfolio,
    Tokenization,
    Analytics,
    Grievances,
    Assistant,
    Documents,
    NotFound,
}

impl Route {
    /// Every routable page, in menu order.
    pub const ALL: [Route; 11] = [
        Route::Home,
        Route::Login,
        Route::Register,
        Route::Dashboard,
        Route::Trading,
        Route::Portfolio,
        Route::Tokenization,
        Route::Analytics,
        Route::Grievances,
        Route::Assistant,
        Route::Documents,
    ];

    /// Match a location; query string, fragment and trailing slash are ignored.
    pub fn from_path(path: &str) -> Route {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let path = match path.trim_end_matches('/') {
            "" => "/",
            trimmed => trimmed,
        };
        Route::ALL
            .into_iter()
            .find(|route| route.path() == path)
            .unwrap_or(Route::NotFound)
    }

    pub fn path(&self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::Login => LOGIN_PATH,
            Route::Register => "/auth/register",
            Route::Dashboard => "/dashboard",
            Route::Trading => "/trading",
            Route::Portfolio => "/portfolio",
            Route::Tokenization => "/tokenization",
            Route::Analytics => "/analytics",
            Route::Grievances => "/grievances",
            Route::Assistant => "/assistant",
            Route::Documents => "/documents",
            Route::NotFound => "*",
        }
    }

    pub fn is_protected(&self) -> bool {
        !matches!(
            self,
            Route::Home | Route::Login | Route::Register | Route::NotFound
        )
    }

    /// Translation key for the page title.
    pub fn title_key(&self) -> &'static str {
        match self {
            Route::Home => "common.welcome",
            Route::Login => "common.login",
            Route::Register => "common.register",
            Route::Dashboard => "common.dashboard",
            Route::Trading => "common.trading",
            Route::Portfolio => "common.portfolio",
            Route::Tokenization => "common.tokenization",
            Route::Analytics => "common.analytics",
            Route::Grievances => "common.grievances",
            Route::Assistant => "common.assistant",
            Route::Documents => "common.documents",
            Route::NotFound => "shell.notFound",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Render(Route),
    /// Session state not yet known; show a loading indicator.
    Loading,
    /// Send the visitor to the login page, remembering where they were going.
    RedirectToLogin { from: String },
}

/// Decide what to show for `path` given the session state.
pub fn gate(state: SessionState, path: &str) -> GateDecision {
    let route = Route::from_path(path);
    if !route.is_protected() {
        return GateDecision::Render(route);
    }
    match state {
        SessionState::Authenticated => GateDecision::Render(route),
        SessionState::Authenticating => GateDecision::Loading,
        SessionState::Unauthenticated => GateDecision::RedirectToLogin {
            from: path.to_string(),
        },
    }
}

/// Current location plus the pending post-login destination.
#[derive(Debug, Clone)]
pub struct Navigator {
    location: String,
    return_to: Option<String>,
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator {
    pub fn new() -> Self {
        Self {
            location: Route::Home.path().to_string(),
            return_to: None,
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn return_to(&self) -> Option<&str> {
        self.return_to.as_deref()
    }

    /// Go to `path`, following gate redirects.
    pub fn navigate(&mut self, path: &str, state: SessionState) -> GateDecision {
        let decision = gate(state, path);
        match &decision {
            GateDecision::Render(Route::Login) if state == SessionState::Authenticated => {
                // Signed-in visitors skip the login page
                let target = self.resume_after_login();
                return GateDecision::Render(Route::from_path(&target));
            }
            GateDecision::Render(_) | GateDecision::Loading => {
                self.location = path.to_string();
            }
            GateDecision::RedirectToLogin { from } => {
                debug!("Redirecting {} to login", from);
                self.return_to = Some(from.clone());
                self.location = LOGIN_PATH.to_string();
            }
        }
        decision
    }

    /// After a successful sign-in: go to the remembered path, or the
    /// dashboard when there is none. Returns the new location.
    pub fn resume_after_login(&mut self) -> String {
        let target = self
            .return_to
            .take()
            .unwrap_or_else(|| DEFAULT_RETURN_PATH.to_string());
        self.location = target.clone();
        target
    }
}
