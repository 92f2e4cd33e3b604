//! Authentication hook for validating login requests.
//!
//! Encore doesn't own the account database. The server hands every login
//! request to an [`Authenticator`] and gets back the account it belongs
//! to, or an error. Production plugs in the real account store; tests
//! plug in a fixed table.

use crate::{SessionError, UserAccount};

/// Everything the client sends when it logs in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoginRequest {
    pub username: String,
    /// MD5 of the plaintext password, as the client sends it.
    pub password_md5: String,
    /// Full client build string, e.g. `b20240123.2cuttingedge`.
    pub client_version: String,
    pub client_hash: String,
    pub utc_offset: i8,
    pub display_city: bool,
    pub block_non_friend_dms: bool,
}

impl LoginRequest {
    /// The leading dot-segment of the client version (`b20240123` for
    /// `b20240123.2cuttingedge`). Score submissions must match it.
    pub fn version_prefix(&self) -> &str {
        version_prefix(&self.client_version)
    }
}

/// Returns the part of a client version string before the first `.`.
pub fn version_prefix(client_version: &str) -> &str {
    client_version
        .split('.')
        .next()
        .unwrap_or(client_version)
}

/// Validates a login request and returns the account behind it.
///
/// `Send + Sync + 'static` because one authenticator lives for the whole
/// server and is called from many request tasks at once.
///
/// # Example
///
/// ```rust
/// use encore_protocol::{Rank, UserId};
/// use encore_session::{Authenticator, LoginRequest, SessionError, UserAccount};
///
/// /// Accepts anyone whose password hash is "dev". Development only.
/// struct DevAuthenticator;
///
/// impl Authenticator for DevAuthenticator {
///     async fn authenticate(
///         &self,
///         request: &LoginRequest,
///     ) -> Result<UserAccount, SessionError> {
///         if request.password_md5 != "dev" {
///             return Err(SessionError::AuthFailed("bad password".into()));
///         }
///         Ok(UserAccount {
///             id: UserId(1000),
///             username: request.username.clone(),
///             rank: Rank::Player,
///             country: 0,
///             restricted: false,
///         })
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Checks the credentials in `request`.
    ///
    /// # Returns
    /// - `Ok(UserAccount)`: the credentials belong to this account.
    /// - `Err(SessionError::AuthFailed)`: unknown user or bad password.
    fn authenticate(
        &self,
        request: &LoginRequest,
    ) -> impl std::future::Future<Output = Result<UserAccount, SessionError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_prefix_takes_leading_segment() {
        assert_eq!(version_prefix("b20240123.2cuttingedge"), "b20240123");
        assert_eq!(version_prefix("b20240123"), "b20240123");
        assert_eq!(version_prefix(""), "");
    }

    #[test]
    fn test_login_request_version_prefix() {
        let request = LoginRequest {
            client_version: "b20991231.1".into(),
            ..LoginRequest::default()
        };
        assert_eq!(request.version_prefix(), "b20991231");
    }
}
