//! Multiplayer matches for Encore.
//!
//! Each match is plain state behind its own mutex. Handlers lock it,
//! call one state-machine operation, release it, and then fan the new
//! snapshot out to the occupants.
//!
//! # Key types
//!
//! - [`Match`]: the state machine (slots, host, readiness, play state)
//! - [`MatchRegistry`]: creates, finds, and removes matches
//! - [`MatchHandle`]: a shared, lockable reference to one match
//! - [`MatchConfig`]: slot count and name limits
//! - [`broadcast`]: snapshot fan-out to occupants

mod broadcast;
mod config;
mod error;
mod registry;
mod room;

pub use broadcast::{broadcast, send_to, send_to_occupants};
pub use config::MatchConfig;
pub use error::MatchError;
pub use registry::{MatchHandle, MatchRegistry};
pub use room::{LeaveOutcome, Match, Slot, SkipOutcome};
