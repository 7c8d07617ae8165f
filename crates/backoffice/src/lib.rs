//! # Backoffice
//!
//! Authenticated API sessions for back-office dashboards.
//!
//! Backoffice keeps an admin signed in against a REST backend: it stores
//! the access/refresh token pair, attaches the access token to every call,
//! refreshes it silently when it expires (one refresh no matter how many
//! calls noticed), and sends the user back to login when the session
//! can't be saved.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use backoffice::prelude::*;
//!
//! # async fn run() -> Result<(), BackofficeError> {
//! let client = ApiClient::builder(ReqwestTransport::new("https://api.shop.test"))
//!     .build();
//! client.login("ops@shop.test", "hunter2").await?;
//!
//! let mut guard = RequireAuthGuard::new(client.clone());
//! if guard.mount().await == GuardState::RenderChildren {
//!     let orders = client.get("/orders").await?;
//!     println!("{}", orders.text());
//! }
//! # Ok(())
//! # }
//! ```

mod error;
pub mod telemetry;

pub use error::BackofficeError;

pub use backoffice_client as client;
pub use backoffice_guard as guard;
pub use backoffice_protocol as protocol;
pub use backoffice_session as session;
pub use backoffice_transport as transport;

/// The types most applications need.
pub mod prelude {
    pub use crate::BackofficeError;
    pub use backoffice_client::{ApiClient, ApiError, ClientConfig, RefreshError};
    pub use backoffice_guard::{GuardState, PublicOnlyGuard, RequireAuthGuard};
    pub use backoffice_protocol::{Role, Timestamp, User};
    pub use backoffice_session::{
        FileTokenStore, MemoryNavigator, MemoryTokenStore, Navigator, Route, SessionConfig,
        SessionState, TokenStore,
    };
    pub use backoffice_transport::{ApiRequest, ApiResponse, ReqwestTransport, Transport};
}
