/// Signed-in user identity
///
/// Authentication itself is handled by the backing service; this module
/// only models the identity it hands back. A [`Session`] is created when
/// the service reports a sign-in and dropped on sign-out, and repositories
/// take it at construction so no ambient global identity exists anywhere
/// in the crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque user identity assigned by the backing service
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Wraps a raw user id string
    pub fn new(id: impl Into<String>) -> Self {
        UserId(id.into())
    }

    /// Returns the raw id string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        UserId(id.to_string())
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        UserId(id)
    }
}

/// A signed-in session
///
/// Holds the identity every repository operation is scoped by. Lives from
/// sign-in to sign-out; dropping it releases nothing on the server side.
#[derive(Debug, Clone)]
pub struct Session {
    user: UserId,
    started_at: DateTime<Utc>,
}

impl Session {
    /// Begins a session for `user`
    pub fn begin(user: UserId) -> Self {
        Session {
            user,
            started_at: Utc::now(),
        }
    }

    /// The signed-in user
    pub fn user(&self) -> &UserId {
        &self.user
    }

    /// When the session began
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_display() {
        let id = UserId::new("uid-123");
        assert_eq!(id.to_string(), "uid-123");
        assert_eq!(id.as_str(), "uid-123");
    }

    #[test]
    fn test_session_holds_user() {
        let session = Session::begin(UserId::from("alice"));
        assert_eq!(session.user(), &UserId::from("alice"));
    }
}
