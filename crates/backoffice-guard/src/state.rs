//! Guard states and the policies that pick between them.

// ---------------------------------------------------------------------------
// GuardState
// ---------------------------------------------------------------------------

/// What a route guard is currently showing.
///
/// A guard starts in `Verifying` and settles into exactly one of the
/// other three:
///
/// ```text
///              ┌──→ RedirectToLogin
/// Verifying ───┼──→ RedirectToApp
///              └──→ RenderChildren ──(session change)──→ RedirectTo…
/// ```
///
/// - **Verifying**: the session is being checked; show a loading state.
/// - **RedirectToLogin**: the user must sign in first.
/// - **RedirectToApp**: the user is signed in and has no business here.
/// - **RenderChildren**: show the guarded content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Verifying,
    RedirectToLogin,
    RedirectToApp,
    RenderChildren,
}

impl GuardState {
    /// Returns `true` once verification has finished.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Verifying)
    }

    /// Returns `true` if the guard navigated away.
    pub fn is_redirect(self) -> bool {
        matches!(self, Self::RedirectToLogin | Self::RedirectToApp)
    }
}

impl std::fmt::Display for GuardState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Verifying => write!(f, "Verifying"),
            Self::RedirectToLogin => write!(f, "RedirectToLogin"),
            Self::RedirectToApp => write!(f, "RedirectToApp"),
            Self::RenderChildren => write!(f, "RenderChildren"),
        }
    }
}

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

/// Decides what a guard shows once it knows whether the user is signed in.
pub trait GuardPolicy: Send + Sync + 'static {
    /// Name used in logs.
    const NAME: &'static str;

    fn decide(authenticated: bool) -> GuardState;
}

/// Lets only signed-in users through (the dashboard).
#[derive(Debug, Clone, Copy, Default)]
pub struct RequireAuth;

impl GuardPolicy for RequireAuth {
    const NAME: &'static str = "require-auth";

    fn decide(authenticated: bool) -> GuardState {
        if authenticated {
            GuardState::RenderChildren
        } else {
            GuardState::RedirectToLogin
        }
    }
}

/// Lets only signed-out users through (the login page).
#[derive(Debug, Clone, Copy, Default)]
pub struct PublicOnly;

impl GuardPolicy for PublicOnly {
    const NAME: &'static str = "public-only";

    fn decide(authenticated: bool) -> GuardState {
        if authenticated {
            GuardState::RedirectToApp
        } else {
            GuardState::RenderChildren
        }
    }
}
