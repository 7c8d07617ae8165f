//! Session state for the back-office client.
//!
//! This crate owns everything the dashboard remembers about who is
//! logged in:
//!
//! 1. **Token storage**: durable key/value persistence of the access
//!    token, refresh token, and refresh expiry ([`TokenStore`],
//!    [`MemoryTokenStore`], [`FileTokenStore`])
//! 2. **Session state**: the in-memory, process-wide view of the
//!    authenticated user and current token ([`SessionState`])
//! 3. **Navigation**: the seam through which session changes turn into
//!    redirects ([`Navigator`], [`Route`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Guard / Client (above)  ← read and mutate the session
//!     ↕
//! Session Layer (this crate)  ← tokens, user, authenticated flag
//!     ↕
//! Protocol Layer (below)  ← User, Timestamp
//! ```

mod config;
mod error;
mod navigation;
mod session;
mod store;

pub use config::{SessionConfig, StorageKeys};
pub use error::SessionError;
pub use navigation::{MemoryNavigator, Navigator, Route};
pub use session::{Session, SessionState};
pub use store::{FileTokenStore, MemoryTokenStore, TokenStore};
