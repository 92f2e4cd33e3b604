//! Error types for the session layer.

use encore_protocol::UserId;

/// Errors that can occur while authenticating or looking up sessions.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Authentication failed: unknown user, wrong password, or a login
    /// request the [`Authenticator`](crate::Authenticator) refused.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The account exists but is restricted and may not log in.
    #[error("user {0} is restricted")]
    Restricted(UserId),

    /// No session exists for the given user.
    #[error("no session for user {0}")]
    NotFound(UserId),

    /// No online user with that name.
    #[error("no session for username {0:?}")]
    UnknownUsername(String),
}
