//! Fan-out of match state to the sessions sitting in it.
//!
//! The snapshot is taken under the match lock, the lock is released, and
//! only then is anything enqueued. Sessions drop snapshots older than the
//! last one they saw, so out-of-order delivery between concurrent
//! broadcasts can't roll a client back.

use encore_protocol::{ServerPacket, UserId};
use encore_session::SessionDirectory;

use crate::MatchHandle;

/// Enqueues the current snapshot of `handle` on every occupant's session.
/// Returns how many sessions accepted it.
pub fn broadcast(handle: &MatchHandle, directory: &SessionDirectory) -> usize {
    let (snapshot, occupants) = {
        let game = handle.lock();
        (game.snapshot(), game.occupants())
    };

    occupants
        .iter()
        .filter_map(|&user| directory.by_user_id(user))
        .filter(|session| session.enqueue_match_update(snapshot.clone()))
        .count()
}

/// Sends `packet` to each of `users` that is still online.
pub fn send_to(users: &[UserId], directory: &SessionDirectory, packet: &ServerPacket) -> usize {
    users
        .iter()
        .filter_map(|&user| directory.by_user_id(user))
        .filter(|session| session.send(packet.clone()))
        .count()
}

/// Sends `packet` to every current occupant of `handle`.
pub fn send_to_occupants(
    handle: &MatchHandle,
    directory: &SessionDirectory,
    packet: &ServerPacket,
) -> usize {
    let occupants = handle.lock().occupants();
    send_to(&occupants, directory, packet)
}
