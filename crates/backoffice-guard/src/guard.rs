//! The route guard: verifies the session once on mount, then follows
//! session changes.

use std::marker::PhantomData;

use backoffice_client::ApiClient;
use backoffice_protocol::{Codec, JsonCodec};
use backoffice_session::{Route, Session};
use backoffice_transport::Transport;

use crate::{GuardPolicy, GuardState, PublicOnly, RequireAuth};

/// A guard letting only signed-in users through.
pub type RequireAuthGuard<T, C = JsonCodec> = Guard<RequireAuth, T, C>;

/// A guard letting only signed-out users through.
pub type PublicOnlyGuard<T, C = JsonCodec> = Guard<PublicOnly, T, C>;

/// Gates a view on the session, following policy `P`.
///
/// Verification happens once, in [`mount`](Self::mount):
///
/// 1. Session already authenticated: no network call.
/// 2. No access token stored: no network call, session cleared.
/// 3. Otherwise the backend's check-session endpoint decides. On success
///    the session is rehydrated from the response; on failure stale
///    tokens are cleared and the session logged out.
///
/// Redirects go through the client's navigator.
pub struct Guard<P, T, C = JsonCodec> {
    client: ApiClient<T, C>,
    state: GuardState,
    _policy: PhantomData<P>,
}

impl<P, T, C> Guard<P, T, C>
where
    P: GuardPolicy,
    T: Transport,
    C: Codec + Clone,
{
    pub fn new(client: ApiClient<T, C>) -> Self {
        Self {
            client,
            state: GuardState::Verifying,
            _policy: PhantomData,
        }
    }

    /// The current state; `Verifying` until [`mount`](Self::mount) returns.
    pub fn state(&self) -> GuardState {
        self.state
    }

    pub fn client(&self) -> &ApiClient<T, C> {
        &self.client
    }

    /// Verifies the session and settles the guard.
    ///
    /// Runs once. Calling it again returns the settled state without
    /// touching the network.
    pub async fn mount(&mut self) -> GuardState {
        if self.state.is_terminal() {
            return self.state;
        }

        let authenticated = self.verify().await;
        self.settle(P::decide(authenticated))
    }

    /// Reacts to a session change after mounting.
    ///
    /// Only a guard that is rendering its content moves: a protected view
    /// whose session was logged out goes to login, the login page goes to
    /// the app once the user signs in.
    pub fn on_session_change(&mut self, session: &Session) -> GuardState {
        if self.state != GuardState::RenderChildren {
            return self.state;
        }
        match P::decide(session.authenticated) {
            GuardState::RenderChildren => self.state,
            next => self.settle(next),
        }
    }

    /// Follows session changes until the guard redirects.
    pub async fn follow(&mut self) -> GuardState {
        let mut changes = self.client.session().subscribe();
        while self.state == GuardState::RenderChildren {
            if changes.changed().await.is_err() {
                break;
            }
            let session = changes.borrow_and_update().clone();
            self.on_session_change(&session);
        }
        self.state
    }

    async fn verify(&self) -> bool {
        let session = self.client.session();
        if session.is_authenticated() {
            tracing::debug!(guard = P::NAME, "session already authenticated");
            return true;
        }

        let access_key = &session.keys().access_token;
        let stored = session
            .tokens()
            .get(access_key)
            .filter(|token| !token.is_empty());
        if stored.is_none() {
            tracing::debug!(guard = P::NAME, "no stored access token");
            self.discard_session();
            return false;
        }

        match self.client.check_session().await {
            Ok(checked) => {
                // A refresh may have replaced the token during the check.
                let Some(token) = session.tokens().get(access_key) else {
                    self.discard_session();
                    return false;
                };
                match session.login_success(checked.user, token, checked.token_expires) {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!(guard = P::NAME, error = %e, "could not restore session");
                        self.discard_session();
                        false
                    }
                }
            }
            Err(e) => {
                tracing::info!(guard = P::NAME, error = %e, "stored session rejected");
                self.discard_session();
                false
            }
        }
    }

    fn discard_session(&self) {
        if let Err(e) = self.client.session().logout() {
            tracing::warn!(guard = P::NAME, error = %e, "stale tokens not cleared");
        }
    }

    fn settle(&mut self, next: GuardState) -> GuardState {
        let navigator = self.client.navigator();
        let target = match next {
            GuardState::RedirectToLogin => Some(Route::Login),
            GuardState::RedirectToApp => Some(Route::Home),
            GuardState::Verifying | GuardState::RenderChildren => None,
        };
        if let Some(route) = target {
            if navigator.current() != route {
                navigator.redirect(route);
            }
        }

        tracing::debug!(guard = P::NAME, from = %self.state, to = %next, "guard settled");
        self.state = next;
        next
    }
}
