//! Authenticated API client for the back office.
//!
//! This crate is where requests meet the session:
//!
//! 1. **Request authentication**: every outgoing request picks up the
//!    current access token ([`BearerAuth`])
//! 2. **Fault handling**: 401/403 responses turn into a silent refresh or
//!    a forced logout ([`AuthFaultHandler`], [`classify`])
//! 3. **Refresh coordination**: concurrent expiries collapse into a single
//!    refresh exchange ([`RefreshCoordinator`])
//! 4. **Session flows**: login, check-session, logout ([`ApiClient`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Guard (above)  ← verifies the session on mount
//!     ↕
//! Client Layer (this crate)  ← middleware chain, refresh, logout
//!     ↕
//! Session Layer / Transport Layer (below)  ← tokens, HTTP
//! ```

mod client;
mod config;
mod error;
mod fault;
mod logout;
mod middleware;
mod refresh;

pub use client::{ApiClient, ApiClientBuilder};
pub use config::{AuthEndpoints, ClientConfig, LogoutMethod};
pub use error::{ApiError, RefreshError};
pub use fault::{classify, AuthFaultHandler, Fault};
pub use logout::ForcedLogout;
pub use middleware::{
    BearerAuth, Disposition, MiddlewareChain, RequestMiddleware, ResponseMiddleware,
};
pub use refresh::{RefreshCoordinator, RefreshOutcome};
