//! Route guards for the back office.
//!
//! Two complementary gates, both verifying the session once on mount:
//!
//! - [`RequireAuthGuard`]: renders protected views for signed-in users,
//!   redirects everyone else to login
//! - [`PublicOnlyGuard`]: renders the login page for signed-out users,
//!   redirects everyone else to the app
//!
//! # How it fits in the stack
//!
//! ```text
//! Views (above)  ← render by GuardState
//!     ↕
//! Guard Layer (this crate)  ← verify on mount, follow session changes
//!     ↕
//! Client Layer (below)  ← check-session, session state, navigator
//! ```

mod guard;
mod state;

pub use guard::{Guard, PublicOnlyGuard, RequireAuthGuard};
pub use state::{GuardPolicy, GuardState, PublicOnly, RequireAuth};
