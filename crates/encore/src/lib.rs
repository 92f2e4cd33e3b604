//! # Encore
//!
//! Real-time coordination server for a multiplayer rhythm game.
//!
//! Encore owns the live state of the game: who is online, which matches
//! exist and who sits where, and how each inbound packet changes that
//! state. Accounts, scores, and beatmaps live behind the traits in
//! [`encore_session`] and [`encore_scoring`]; the byte transport lives
//! outside this crate and talks to it through [`Server::login`],
//! [`Server::dispatch`], and each session's outbound queue.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use encore::prelude::*;
//! use encore_scoring::memory::MemoryStore;
//!
//! # struct MyAuth;
//! # impl Authenticator for MyAuth {
//! #     async fn authenticate(&self, _: &LoginRequest) -> Result<UserAccount, SessionError> {
//! #         Err(SessionError::AuthFailed("demo".into()))
//! #     }
//! # }
//! # async fn run() -> Result<(), EncoreError> {
//! init_tracing();
//! let config = ServerConfig::from_env()?;
//! let server = Arc::new(Server::new(config, MyAuth, Arc::new(MemoryStore::new()), JsonCodec));
//! let _sweeper = server.spawn_sweeper(CancellationToken::new());
//!
//! let (session, mut outbound) = server.login(LoginRequest::default(), Location::default()).await?;
//! server.dispatch(session.token().as_str(), Packet::empty(PacketKind::Ping)).await?;
//! while let Some(packet) = outbound.recv().await {
//!     // hand `packet` to the transport
//! #   let _ = packet;
//! }
//! # Ok(())
//! # }
//! ```

pub mod commands;
mod config;
pub mod dispatch;
mod error;
mod handlers;
mod server;
pub mod telemetry;

pub use config::{ConfigError, ServerConfig};
pub use error::{DispatchError, EncoreError, ErrorKind};
pub use server::Server;
pub use telemetry::init_tracing;

pub mod prelude {
    //! Convenience re-exports for embedding the server.

    pub use crate::commands::{Command, CommandError, CommandOutput, Invocation};
    pub use crate::dispatch::{Handler, HandlerRegistry};
    pub use crate::{
        ConfigError, DispatchError, EncoreError, ErrorKind, Server, ServerConfig, init_tracing,
    };
    pub use encore_match::{MatchConfig, MatchError, MatchHandle, MatchRegistry};
    pub use encore_protocol::{
        Codec, GameMode, JsonCodec, MatchId, Mods, Packet, PacketKind, Rank, ServerPacket, UserId,
    };
    pub use encore_scoring::{ClientFlags, ScoreStore, ScoringError};
    pub use encore_session::{
        Authenticator, Location, LoginRequest, OutboundReceiver, Session, SessionConfig,
        SessionDirectory, SessionError, UserAccount,
    };
    pub use tokio_util::sync::CancellationToken;
}
