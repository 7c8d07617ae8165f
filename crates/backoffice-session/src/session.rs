//! Session types: the in-memory record of who is logged in.
//!
//! [`Session`] is a plain snapshot. [`SessionState`] is the single,
//! process-wide owner of the current snapshot: it applies the three
//! lifecycle transitions, mirrors the access token into the
//! [`TokenStore`], and broadcasts every change to subscribers.
//!
//! ```text
//!                login_success()
//!   [Empty] ─────────────────────────→ [Authenticated]
//!      ↑                                   │     ↑
//!      │            logout()               │     │ update_token()
//!      └───────────────────────────────────┘     │ (user untouched)
//!                                                └──┘
//! ```

use std::sync::Arc;

use backoffice_protocol::{Timestamp, User};
use tokio::sync::watch;

use crate::{SessionConfig, SessionError, StorageKeys, TokenStore};

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A snapshot of the session at one moment.
///
/// Invariant: `authenticated == true` implies `user` and `access_token`
/// are both `Some`. Only [`SessionState`] constructs authenticated
/// snapshots, and it upholds this.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub user: Option<User>,
    pub access_token: Option<String>,
    pub access_token_expires_at: Option<Timestamp>,
    pub authenticated: bool,
}

impl Session {
    /// Returns `true` if the access token is known to be past its expiry.
    ///
    /// A token with no recorded expiry is assumed valid; the backend has
    /// the final word either way.
    pub fn is_access_token_expired(&self, now: Timestamp) -> bool {
        self.access_token_expires_at
            .is_some_and(|expires_at| expires_at.is_past(now))
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// The process-wide session store.
///
/// Construct one per running application (cold start: empty) and share it
/// by `Arc` with the API client and the route guards. All transitions are
/// synchronous, so a reader never observes a half-applied change.
pub struct SessionState {
    tokens: Arc<dyn TokenStore>,
    keys: StorageKeys,
    current: watch::Sender<Session>,
}

impl SessionState {
    /// Creates an empty session over the given token store.
    ///
    /// Tokens already in the store are left alone: a restarted process
    /// starts unauthenticated and the route guards decide whether the
    /// persisted token is still good.
    pub fn new(tokens: Arc<dyn TokenStore>, config: SessionConfig) -> Self {
        let (current, _) = watch::channel(Session::default());
        Self {
            tokens,
            keys: config.keys,
            current,
        }
    }

    /// The durable store backing this session.
    pub fn tokens(&self) -> &Arc<dyn TokenStore> {
        &self.tokens
    }

    /// Storage key names in use.
    pub fn keys(&self) -> &StorageKeys {
        &self.keys
    }

    /// A copy of the current session.
    pub fn snapshot(&self) -> Session {
        self.current.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.borrow().authenticated
    }

    /// The in-memory access token (not re-read from storage).
    pub fn access_token(&self) -> Option<String> {
        self.current.borrow().access_token.clone()
    }

    /// Subscribes to session changes. The receiver starts at the current
    /// snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.current.subscribe()
    }

    /// Records a successful login (or check-session rehydration).
    ///
    /// Persists the access token, then marks the session authenticated.
    /// If persisting fails the in-memory session is left unchanged.
    pub fn login_success(
        &self,
        user: User,
        access_token: String,
        expires_at: Timestamp,
    ) -> Result<(), SessionError> {
        self.tokens.set(&self.keys.access_token, &access_token)?;

        tracing::info!(user_id = %user.id, %expires_at, "session authenticated");

        self.current.send_replace(Session {
            user: Some(user),
            access_token: Some(access_token),
            access_token_expires_at: Some(expires_at),
            authenticated: true,
        });
        Ok(())
    }

    /// Installs a refreshed access token.
    ///
    /// Touches only the token and its expiry: a refresh never changes who
    /// is logged in, and never logs anyone out.
    pub fn update_token(
        &self,
        access_token: String,
        expires_at: Timestamp,
    ) -> Result<(), SessionError> {
        self.tokens.set(&self.keys.access_token, &access_token)?;

        self.current.send_modify(|session| {
            session.access_token = Some(access_token);
            session.access_token_expires_at = Some(expires_at);
        });
        tracing::debug!(%expires_at, "access token updated");
        Ok(())
    }

    /// Clears the session and removes every persisted token.
    ///
    /// Idempotent. The in-memory session is cleared even if the storage
    /// cleanup fails; the storage error is returned for the caller to
    /// report.
    pub fn logout(&self) -> Result<(), SessionError> {
        let was_authenticated = self.is_authenticated();
        self.current.send_if_modified(|session| {
            if *session == Session::default() {
                return false;
            }
            *session = Session::default();
            true
        });

        if was_authenticated {
            tracing::info!("session cleared");
        }

        self.tokens.clear_all()
    }

    /// Tears down the in-memory session without touching durable storage.
    ///
    /// Used when the application shuts down: the persisted tokens stay for
    /// the next cold start to verify.
    pub fn dispose(&self) {
        self.current.send_replace(Session::default());
        tracing::debug!("session state disposed");
    }
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print tokens.
        let session = self.current.borrow();
        f.debug_struct("SessionState")
            .field("authenticated", &session.authenticated)
            .field("user", &session.user.as_ref().map(|u| &u.id))
            .finish_non_exhaustive()
    }
}
