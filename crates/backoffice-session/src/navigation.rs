//! The navigation seam: where session decisions become redirects.
//!
//! The session machinery never renders anything. When it decides the user
//! must go to the login screen (forced logout) or away from it (already
//! authenticated), it asks a [`Navigator`]. A web front end would back
//! this with its router; the CLI and tests use [`MemoryNavigator`].

use std::fmt;
use std::sync::{Mutex, PoisonError};

/// A view the dashboard can show.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    /// The login screen.
    Login,
    /// The main application landing view.
    Home,
    /// Any other view, by path.
    Path(String),
}

impl Route {
    /// The URL path for this route.
    pub fn path(&self) -> &str {
        match self {
            Self::Login => "/login",
            Self::Home => "/",
            Self::Path(path) => path,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Performs redirects on behalf of the session layer.
pub trait Navigator: Send + Sync + 'static {
    /// The route currently shown.
    fn current(&self) -> Route;

    /// Replaces the current route.
    fn redirect(&self, to: Route);
}

/// A [`Navigator`] that only remembers where it is and where it has been.
#[derive(Debug)]
pub struct MemoryNavigator {
    current: Mutex<Route>,
    history: Mutex<Vec<Route>>,
}

impl MemoryNavigator {
    /// Creates a navigator positioned at `start`.
    pub fn new(start: Route) -> Self {
        Self {
            current: Mutex::new(start),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Every redirect performed so far, oldest first.
    pub fn history(&self) -> Vec<Route> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for MemoryNavigator {
    fn default() -> Self {
        Self::new(Route::Home)
    }
}

impl Navigator for MemoryNavigator {
    fn current(&self) -> Route {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn redirect(&self, to: Route) {
        tracing::debug!(route = %to, "redirect");
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) =
            to.clone();
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(to);
    }
}
