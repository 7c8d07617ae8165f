//! Single-flight access-token refresh.
//!
//! When several requests discover at once that the access token expired,
//! exactly one refresh exchange goes to the backend. Everyone else waits
//! in a FIFO queue and receives the outcome of that one exchange.
//!
//! ```text
//!            first fault                    exchange settles
//!   [Idle] ──────────────→ [Refreshing] ───────────────────→ [Idle]
//!                            │   ↑                             │
//!                 later fault│   │ queued                      │ release queue
//!                            └───┘                             ▼ (arrival order)
//! ```
//!
//! The Idle→Refreshing check-and-set happens under a lock with no `.await`
//! inside it, so two refreshes can't start concurrently even on a
//! multi-threaded runtime. The transition back to Idle runs from a drop
//! guard, so it happens even if the leader's future panics or is dropped.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use backoffice_protocol::{Codec, ErrorBody, RefreshRequest, RefreshResponse, Timestamp};
use backoffice_session::SessionState;
use backoffice_transport::{ApiRequest, RequestId, Transport};
use tokio::sync::oneshot;

use crate::{ForcedLogout, RefreshError};

/// The outcome every waiter receives.
pub type RefreshOutcome = Result<String, RefreshError>;

// ---------------------------------------------------------------------------
// RefreshGate
// ---------------------------------------------------------------------------

/// A request parked until the in-flight refresh settles.
struct QueuedRequest {
    request_id: RequestId,
    reply: oneshot::Sender<RefreshOutcome>,
}

#[derive(Default)]
enum Phase {
    #[default]
    Idle,
    Refreshing { queue: VecDeque<QueuedRequest> },
}

/// What [`RefreshGate::enter`] decided for the caller.
pub(crate) enum Entry {
    /// The caller must perform the exchange and then settle the gate.
    Leader,
    /// A refresh is already running; await its outcome here.
    Follower(oneshot::Receiver<RefreshOutcome>),
}

/// The Idle/Refreshing state machine and its waiter queue.
#[derive(Default)]
pub(crate) struct RefreshGate {
    phase: Mutex<Phase>,
}

impl RefreshGate {
    fn lock(&self) -> MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Atomically either claims the refresh or joins the queue.
    pub(crate) fn enter(&self, request_id: RequestId) -> Entry {
        let mut phase = self.lock();
        if let Phase::Refreshing { queue } = &mut *phase {
            let (reply, rx) = oneshot::channel();
            queue.push_back(QueuedRequest { request_id, reply });
            tracing::debug!(
                %request_id,
                queued = queue.len(),
                "queued behind in-flight refresh"
            );
            return Entry::Follower(rx);
        }
        *phase = Phase::Refreshing {
            queue: VecDeque::new(),
        };
        Entry::Leader
    }

    /// Returns to Idle and releases every queued request, oldest first.
    pub(crate) fn settle(&self, outcome: &RefreshOutcome) {
        let queue = match std::mem::take(&mut *self.lock()) {
            Phase::Refreshing { queue } => queue,
            Phase::Idle => VecDeque::new(),
        };
        for waiter in queue {
            if waiter.reply.send(outcome.clone()).is_err() {
                tracing::debug!(
                    request_id = %waiter.request_id,
                    "waiter gone before refresh settled"
                );
            }
        }
    }

    pub(crate) fn is_refreshing(&self) -> bool {
        matches!(*self.lock(), Phase::Refreshing { .. })
    }
}

/// Settles the gate with [`RefreshError::Abandoned`] unless the leader
/// settled it explicitly.
struct SettleOnDrop<'a> {
    gate: &'a RefreshGate,
    settled: bool,
}

impl SettleOnDrop<'_> {
    fn settle(mut self, outcome: &RefreshOutcome) {
        self.settled = true;
        self.gate.settle(outcome);
    }
}

impl Drop for SettleOnDrop<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!("refresh leader dropped before settling");
            self.gate.settle(&Err(RefreshError::Abandoned));
        }
    }
}

// ---------------------------------------------------------------------------
// RefreshCoordinator
// ---------------------------------------------------------------------------

/// Performs refresh-token exchanges, at most one at a time.
pub struct RefreshCoordinator<T, C> {
    transport: Arc<T>,
    codec: C,
    session: Arc<SessionState>,
    logout: ForcedLogout,
    refresh_path: String,
    gate: RefreshGate,
    exchanges: AtomicU64,
}

impl<T, C> RefreshCoordinator<T, C>
where
    T: Transport,
    C: Codec,
{
    pub fn new(
        transport: Arc<T>,
        codec: C,
        session: Arc<SessionState>,
        logout: ForcedLogout,
        refresh_path: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            codec,
            session,
            logout,
            refresh_path: refresh_path.into(),
            gate: RefreshGate::default(),
            exchanges: AtomicU64::new(0),
        }
    }

    /// Number of refresh calls actually sent to the backend.
    pub fn exchange_count(&self) -> u64 {
        self.exchanges.load(Ordering::Relaxed)
    }

    /// `true` while an exchange is outstanding.
    pub fn is_refreshing(&self) -> bool {
        self.gate.is_refreshing()
    }

    /// Obtains a fresh access token for `request_id`.
    ///
    /// The first caller while Idle runs the exchange; callers arriving
    /// while it runs are queued and get the same outcome. On failure the
    /// session has been terminated by the time any caller sees the error.
    pub async fn refreshed_token(&self, request_id: RequestId) -> RefreshOutcome {
        match self.gate.enter(request_id) {
            Entry::Follower(rx) => {
                rx.await.unwrap_or(Err(RefreshError::Abandoned))
            }
            Entry::Leader => {
                let guard = SettleOnDrop {
                    gate: &self.gate,
                    settled: false,
                };
                tracing::debug!(%request_id, "leading token refresh");

                let outcome = self.exchange().await;
                match &outcome {
                    Ok(_) => tracing::info!("access token refreshed"),
                    Err(e) => {
                        tracing::warn!(error = %e, "token refresh failed");
                        self.logout.trigger("token refresh failed");
                    }
                }

                guard.settle(&outcome);
                outcome
            }
        }
    }

    /// One refresh exchange: read the refresh token, call the backend,
    /// persist what comes back.
    async fn exchange(&self) -> RefreshOutcome {
        let tokens = self.session.tokens();
        let keys = self.session.keys();

        let refresh_token = tokens
            .get(&keys.refresh_token)
            .filter(|t| !t.is_empty())
            .ok_or(RefreshError::MissingRefreshToken)?;

        if let Some(raw) = tokens.get(&keys.refresh_token_expires_at) {
            match Timestamp::parse(&raw) {
                Ok(expires_at) if expires_at.is_past(Timestamp::now()) => {
                    return Err(RefreshError::RefreshTokenExpired);
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(error = %e, "ignoring unreadable refresh expiry");
                }
            }
        }

        let body = self
            .codec
            .encode(&RefreshRequest { refresh_token })
            .map_err(|e| RefreshError::Protocol(e.to_string()))?;
        let request = ApiRequest::post(self.refresh_path.as_str())
            .with_body(self.codec.content_type(), body);

        self.exchanges.fetch_add(1, Ordering::Relaxed);
        let response = self
            .transport
            .send(&request)
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))?;

        if !response.is_success() {
            let body: ErrorBody =
                self.codec.decode(&response.body).unwrap_or_default();
            return Err(RefreshError::Rejected {
                status: response.status,
                code: body.code,
            });
        }

        let refreshed: RefreshResponse = self
            .codec
            .decode(&response.body)
            .map_err(|e| RefreshError::Protocol(e.to_string()))?;

        let storage = |e: backoffice_session::SessionError| {
            RefreshError::Storage(e.to_string())
        };
        if let Some(rotated) = &refreshed.refresh_token {
            tokens.set(&keys.refresh_token, rotated).map_err(storage)?;
        }
        if let Some(expires_at) = refreshed.refresh_token_expires_at {
            tokens
                .set(&keys.refresh_token_expires_at, &expires_at.to_string())
                .map_err(storage)?;
        }
        self.session
            .update_token(refreshed.token.clone(), refreshed.expires_at)
            .map_err(storage)?;

        Ok(refreshed.token)
    }
}
