//! Core value types shared by every layer: identities and timestamps.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// The backend's identifier for a back-office user.
///
/// Newtype over the raw string so a user id can't be passed where a token
/// is expected. `#[serde(transparent)]` keeps it a bare string in JSON.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U-{}", self.0)
    }
}

/// What a back-office user is allowed to do.
///
/// Unknown roles from a newer backend deserialize as [`Role::Other`]
/// instead of failing the whole login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    Editor,
    #[serde(other)]
    Other,
}

/// The identity record the backend returns on login and check-session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(alias = "_id")]
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
}

// ---------------------------------------------------------------------------
// Timestamp
// ---------------------------------------------------------------------------

/// A point in time as epoch milliseconds (UTC).
///
/// The backend is not consistent about expiry formats: some responses
/// carry `1700000000000`, others `"2023-11-14T22:13:20Z"`. Both
/// deserialize into the same `Timestamp`; it always serializes as a
/// number.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Wraps a raw epoch-millisecond value.
    pub fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// The current wall-clock time.
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp_millis())
    }

    /// Returns the epoch-millisecond value.
    pub fn as_millis(self) -> i64 {
        self.0
    }

    /// Returns `true` if this instant is at or before `now`.
    pub fn is_past(self, now: Timestamp) -> bool {
        self.0 <= now.0
    }

    /// Parses epoch milliseconds (`"1700000000000"`) or RFC 3339
    /// (`"2023-11-14T22:13:20Z"`).
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidTimestamp`] for anything else.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let trimmed = text.trim();
        if let Ok(millis) = trimmed.parse::<i64>() {
            return Ok(Self(millis));
        }
        chrono::DateTime::parse_from_rfc3339(trimmed)
            .map(|dt| Self(dt.timestamp_millis()))
            .map_err(|_| ProtocolError::InvalidTimestamp(text.to_string()))
    }
}

impl FromStr for Timestamp {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Millis(i64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Millis(millis) => Ok(Self(millis)),
            Raw::Text(text) => {
                Self::parse(&text).map_err(serde::de::Error::custom)
            }
        }
    }
}
