//! Wire protocol for the back-office auth API.
//!
//! This crate defines what the dashboard and the REST backend say to each
//! other about sessions:
//!
//! - **Types** ([`User`], [`Timestamp`], [`UserId`], [`Role`]) describe
//!   who is logged in and when credentials expire.
//! - **Messages** ([`LoginRequest`], [`LoginResponse`], [`RefreshRequest`],
//!   [`RefreshResponse`], [`CheckSessionResponse`], [`ErrorBody`]) are the
//!   JSON bodies of the auth endpoints.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) turns those bodies into
//!   bytes and back.
//! - **Errors** ([`ProtocolError`]) report what went wrong while doing so.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw HTTP bodies) and the
//! session layer (who is authenticated). It knows nothing about requests
//! in flight or stored tokens.
//!
//! ```text
//! Transport (bytes) → Protocol (LoginResponse, ErrorBody) → Session
//! ```

mod codec;
mod error;
mod messages;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use messages::{
    CheckSessionResponse, ErrorBody, LoginRequest, LoginResponse,
    RefreshRequest, RefreshResponse, TOKEN_EXPIRED,
};
pub use types::{Role, Timestamp, User, UserId};
