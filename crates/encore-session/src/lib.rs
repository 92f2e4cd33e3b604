//! Connected-player state for Encore.
//!
//! This crate owns everything the server knows about a logged-in client:
//!
//! 1. **Authentication**: turning a login request into an account
//!    ([`Authenticator`] trait).
//! 2. **Sessions**: one [`Session`] per client, with its outbound queue.
//! 3. **Directory**: finding sessions by token, user id, or username
//!    ([`SessionDirectory`]).
//! 4. **Presence**: status, location, and the views other players see
//!    ([`Presence`]).
//!
//! # How it fits in the stack
//!
//! ```text
//! Match layer (above)    ← slot occupants are user ids resolved here
//!     ↕
//! Session layer (this crate)
//!     ↕
//! Protocol layer (below) ← UserId, ServerPacket, view types
//! ```

#![allow(async_fn_in_trait)]

mod auth;
mod directory;
mod error;
mod presence;
mod session;

pub use auth::{Authenticator, LoginRequest, version_prefix};
pub use directory::SessionDirectory;
pub use error::SessionError;
pub use presence::{ClientFingerprint, Location, Presence};
pub use session::{OutboundReceiver, Session, SessionConfig, UserAccount, generate_token};
