//! Forced logout: the single exit path for an unrecoverable session.

use std::sync::Arc;

use backoffice_session::{Navigator, Route, SessionState};

/// Clears the session and sends the user to the login screen.
///
/// Shared by the fault handler (401/403), the refresh coordinator (refresh
/// failed), and explicit logout. Calling it on an already-empty session is
/// harmless: state stays empty and the redirect happens only if the user
/// isn't on the login screen already.
#[derive(Clone)]
pub struct ForcedLogout {
    session: Arc<SessionState>,
    navigator: Arc<dyn Navigator>,
}

impl ForcedLogout {
    pub fn new(session: Arc<SessionState>, navigator: Arc<dyn Navigator>) -> Self {
        Self { session, navigator }
    }

    /// Terminates the session. `reason` only feeds the log line.
    pub fn trigger(&self, reason: &str) {
        let was_authenticated = self.session.is_authenticated();

        // The in-memory session is cleared even if storage cleanup fails.
        if let Err(e) = self.session.logout() {
            tracing::warn!(reason, error = %e, "persisted tokens not cleared");
        }

        if was_authenticated {
            tracing::info!(reason, "session terminated");
        } else {
            tracing::debug!(reason, "logout on empty session");
        }

        if self.navigator.current() != Route::Login {
            self.navigator.redirect(Route::Login);
        }
    }
}
