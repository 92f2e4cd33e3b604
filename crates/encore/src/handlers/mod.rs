//! Built-in packet handlers, one module per concern.

pub(crate) mod chat;
pub(crate) mod multiplayer;
pub(crate) mod presence;
