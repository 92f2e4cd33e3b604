//! Multiplayer handlers.
//!
//! Creating and joining run outside any match. Everything else runs
//! against the sender's current match: lock it, apply one operation,
//! unlock, then fan out. A rejected operation sends nothing.

use std::sync::Arc;

use encore_match::{MatchError, MatchHandle, broadcast, send_to, send_to_occupants};
use encore_protocol::{
    Codec, CreateMatchRequest, JoinMatchRequest, MatchSettings, ModsRequest, Packet,
    PasswordRequest, ServerPacket, SlotRequest, UserId,
};
use encore_scoring::ScoreStore;
use encore_session::{Authenticator, Session};

use crate::{EncoreError, Server};

// ---------------------------------------------------------------------------
// Outside a match
// ---------------------------------------------------------------------------

/// Creates a match hosted by the sender, leaving any match they were in.
pub(crate) async fn create_match<A, S, C>(
    server: &Server<A, S, C>,
    session: &Arc<Session>,
    packet: &Packet,
) -> Result<(), EncoreError>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    let request: CreateMatchRequest = packet.decode(server.codec())?;
    if session.is_evicted() {
        return Ok(());
    }
    let handle = server.matches().create(session.id(), request.settings, request.password);
    let match_id = handle.match_id();
    if let Some(previous) = session.set_current_match(Some(match_id)) {
        server.leave_match(session.id(), previous);
    }
    if server.release_if_evicted(session) {
        return Ok(());
    }

    let snapshot = handle.snapshot();
    session.send(ServerPacket::MatchJoinSuccess(snapshot.clone()));
    server.send_to_all(&ServerPacket::MatchNew(snapshot));
    Ok(())
}

/// Joins an existing match. On any refusal the sender gets
/// `MatchJoinFail` and stays where they were.
pub(crate) async fn join_match<A, S, C>(
    server: &Server<A, S, C>,
    session: &Arc<Session>,
    packet: &Packet,
) -> Result<(), EncoreError>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    let request: JoinMatchRequest = packet.decode(server.codec())?;
    let match_id = request.match_id;

    let joined = match server.matches().get(match_id) {
        None => Err(MatchError::NotFound(match_id)),
        Some(handle) => {
            let mut game = handle.lock();
            // An empty match is already on its way out of the registry.
            if game.is_empty() {
                Err(MatchError::NotFound(match_id))
            } else {
                game.join(session.id(), request.password.as_deref())
                    .map(|_| (game.snapshot(), handle.clone()))
            }
        }
    };

    let (snapshot, handle) = match joined {
        Ok(joined) => joined,
        Err(e) => {
            tracing::debug!(user_id = %session.id(), %match_id, error = %e, "join refused");
            session.send(ServerPacket::MatchJoinFail);
            return Err(e.into());
        }
    };

    if let Some(previous) = session.set_current_match(Some(match_id)) {
        if previous != match_id {
            server.leave_match(session.id(), previous);
        }
    }
    if server.release_if_evicted(session) {
        return Ok(());
    }
    session.send(ServerPacket::MatchJoinSuccess(snapshot));
    broadcast(&handle, server.directory());
    Ok(())
}

// ---------------------------------------------------------------------------
// Inside a match
// ---------------------------------------------------------------------------

pub(crate) fn part_match<A, S, C>(
    server: &Server<A, S, C>,
    session: &Arc<Session>,
    _handle: &MatchHandle,
    _packet: &Packet,
) -> Result<(), EncoreError>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    server.leave_current_match(session);
    Ok(())
}

pub(crate) fn change_slot<A, S, C>(
    server: &Server<A, S, C>,
    session: &Arc<Session>,
    handle: &MatchHandle,
    packet: &Packet,
) -> Result<(), EncoreError>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    let request: SlotRequest = packet.decode(server.codec())?;
    handle.lock().move_to_slot(session.id(), request.slot)?;
    broadcast(handle, server.directory());
    Ok(())
}

pub(crate) fn ready<A, S, C>(
    server: &Server<A, S, C>,
    session: &Arc<Session>,
    handle: &MatchHandle,
    _packet: &Packet,
) -> Result<(), EncoreError>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    handle.lock().set_ready(session.id(), true)?;
    broadcast(handle, server.directory());
    Ok(())
}

pub(crate) fn not_ready<A, S, C>(
    server: &Server<A, S, C>,
    session: &Arc<Session>,
    handle: &MatchHandle,
    _packet: &Packet,
) -> Result<(), EncoreError>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    handle.lock().set_ready(session.id(), false)?;
    broadcast(handle, server.directory());
    Ok(())
}

pub(crate) fn has_beatmap<A, S, C>(
    server: &Server<A, S, C>,
    session: &Arc<Session>,
    handle: &MatchHandle,
    _packet: &Packet,
) -> Result<(), EncoreError>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    handle.lock().set_has_beatmap(session.id(), true)?;
    broadcast(handle, server.directory());
    Ok(())
}

pub(crate) fn no_beatmap<A, S, C>(
    server: &Server<A, S, C>,
    session: &Arc<Session>,
    handle: &MatchHandle,
    _packet: &Packet,
) -> Result<(), EncoreError>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    handle.lock().set_has_beatmap(session.id(), false)?;
    broadcast(handle, server.directory());
    Ok(())
}

/// Locks or unlocks a slot. Locking an occupied slot kicks its occupant.
pub(crate) fn lock<A, S, C>(
    server: &Server<A, S, C>,
    session: &Arc<Session>,
    handle: &MatchHandle,
    packet: &Packet,
) -> Result<(), EncoreError>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    let request: SlotRequest = packet.decode(server.codec())?;
    let kicked = handle.lock().toggle_lock(session.id(), request.slot)?;

    if let Some(kicked) = kicked.and_then(|user| server.directory().by_user_id(user)) {
        let match_id = handle.match_id();
        if kicked.current_match() == Some(match_id) {
            kicked.set_current_match(None);
        }
        kicked.send(ServerPacket::MatchDisposed { match_id });
    }
    broadcast(handle, server.directory());
    Ok(())
}

pub(crate) fn change_settings<A, S, C>(
    server: &Server<A, S, C>,
    session: &Arc<Session>,
    handle: &MatchHandle,
    packet: &Packet,
) -> Result<(), EncoreError>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    let settings: MatchSettings = packet.decode(server.codec())?;
    handle
        .lock()
        .change_settings(session.id(), settings, server.matches().config())?;
    broadcast(handle, server.directory());
    Ok(())
}

pub(crate) fn start<A, S, C>(
    server: &Server<A, S, C>,
    session: &Arc<Session>,
    handle: &MatchHandle,
    _packet: &Packet,
) -> Result<(), EncoreError>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    start_match(server, handle, session.id())?;
    Ok(())
}

pub(crate) fn abort<A, S, C>(
    server: &Server<A, S, C>,
    session: &Arc<Session>,
    handle: &MatchHandle,
    _packet: &Packet,
) -> Result<(), EncoreError>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    abort_match(server, handle, session.id())?;
    Ok(())
}

pub(crate) fn load_complete<A, S, C>(
    server: &Server<A, S, C>,
    session: &Arc<Session>,
    handle: &MatchHandle,
    _packet: &Packet,
) -> Result<(), EncoreError>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    let (all_loaded, playing) = {
        let mut game = handle.lock();
        let all_loaded = game.mark_loaded(session.id())?;
        (all_loaded, game.playing())
    };
    if all_loaded {
        send_to(&playing, server.directory(), &ServerPacket::MatchAllPlayersLoaded);
    }
    Ok(())
}

pub(crate) fn skip_request<A, S, C>(
    server: &Server<A, S, C>,
    session: &Arc<Session>,
    handle: &MatchHandle,
    _packet: &Packet,
) -> Result<(), EncoreError>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    let (outcome, playing) = {
        let mut game = handle.lock();
        let outcome = game.mark_skipped(session.id())?;
        (outcome, game.playing())
    };
    send_to(
        &playing,
        server.directory(),
        &ServerPacket::MatchPlayerSkipped { slot: outcome.slot },
    );
    if outcome.all_skipped {
        send_to(&playing, server.directory(), &ServerPacket::MatchSkip);
    }
    Ok(())
}

pub(crate) fn complete<A, S, C>(
    server: &Server<A, S, C>,
    session: &Arc<Session>,
    handle: &MatchHandle,
    _packet: &Packet,
) -> Result<(), EncoreError>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    let finished = handle.lock().mark_completed(session.id())?;
    if finished {
        send_to_occupants(handle, server.directory(), &ServerPacket::MatchComplete);
    }
    broadcast(handle, server.directory());
    Ok(())
}

pub(crate) fn failed<A, S, C>(
    server: &Server<A, S, C>,
    session: &Arc<Session>,
    handle: &MatchHandle,
    _packet: &Packet,
) -> Result<(), EncoreError>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    let (slot, playing) = {
        let mut game = handle.lock();
        let slot = game.mark_failed(session.id())?;
        (slot, game.playing())
    };
    send_to(&playing, server.directory(), &ServerPacket::MatchPlayerFailed { slot });
    Ok(())
}

pub(crate) fn change_mods<A, S, C>(
    server: &Server<A, S, C>,
    session: &Arc<Session>,
    handle: &MatchHandle,
    packet: &Packet,
) -> Result<(), EncoreError>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    let request: ModsRequest = packet.decode(server.codec())?;
    handle.lock().change_mods(session.id(), request.mods)?;
    broadcast(handle, server.directory());
    Ok(())
}

pub(crate) fn change_team<A, S, C>(
    server: &Server<A, S, C>,
    session: &Arc<Session>,
    handle: &MatchHandle,
    _packet: &Packet,
) -> Result<(), EncoreError>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    handle.lock().change_team(session.id())?;
    broadcast(handle, server.directory());
    Ok(())
}

pub(crate) fn transfer_host<A, S, C>(
    server: &Server<A, S, C>,
    session: &Arc<Session>,
    handle: &MatchHandle,
    packet: &Packet,
) -> Result<(), EncoreError>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    let request: SlotRequest = packet.decode(server.codec())?;
    transfer_host_to(server, handle, session.id(), request.slot)?;
    Ok(())
}

pub(crate) fn change_password<A, S, C>(
    server: &Server<A, S, C>,
    session: &Arc<Session>,
    handle: &MatchHandle,
    packet: &Packet,
) -> Result<(), EncoreError>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    let request: PasswordRequest = packet.decode(server.codec())?;
    set_password(server, handle, session.id(), request.password)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Shared with chat commands
// ---------------------------------------------------------------------------

/// Starts the match and tells each player to load. Returns the players.
pub(crate) fn start_match<A, S, C>(
    server: &Server<A, S, C>,
    handle: &MatchHandle,
    issuer: UserId,
) -> Result<Vec<UserId>, MatchError>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    let (players, snapshot) = {
        let mut game = handle.lock();
        let players = game.start(issuer)?;
        (players, game.snapshot())
    };
    send_to(&players, server.directory(), &ServerPacket::MatchStart(snapshot));
    broadcast(handle, server.directory());
    Ok(players)
}

pub(crate) fn abort_match<A, S, C>(
    server: &Server<A, S, C>,
    handle: &MatchHandle,
    issuer: UserId,
) -> Result<(), MatchError>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    let players = handle.lock().abort(issuer)?;
    send_to(&players, server.directory(), &ServerPacket::MatchAbort);
    broadcast(handle, server.directory());
    Ok(())
}

/// Hands the host role to whoever sits in `slot`. Returns the new host.
pub(crate) fn transfer_host_to<A, S, C>(
    server: &Server<A, S, C>,
    handle: &MatchHandle,
    issuer: UserId,
    slot: usize,
) -> Result<UserId, MatchError>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    let new_host = handle.lock().transfer_host(issuer, slot)?;
    if let Some(host) = server.directory().by_user_id(new_host) {
        host.send(ServerPacket::MatchTransferHost);
    }
    broadcast(handle, server.directory());
    Ok(new_host)
}

pub(crate) fn set_password<A, S, C>(
    server: &Server<A, S, C>,
    handle: &MatchHandle,
    issuer: UserId,
    password: Option<String>,
) -> Result<(), MatchError>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    handle.lock().change_password(issuer, password)?;
    broadcast(handle, server.directory());
    Ok(())
}

#[cfg(test)]
mod tests {
    use encore_protocol::{JsonCodec, PacketKind, Rank};
    use encore_scoring::memory::MemoryStore;
    use encore_session::{Location, LoginRequest, OutboundReceiver, SessionError, UserAccount};

    use super::*;
    use crate::ServerConfig;

    /// Accepts `alice` as user 1 and anyone else as user 2.
    struct AcceptAll;

    impl Authenticator for AcceptAll {
        async fn authenticate(&self, request: &LoginRequest) -> Result<UserAccount, SessionError> {
            let id = if request.username == "alice" { 1 } else { 2 };
            Ok(UserAccount {
                id: UserId(id),
                username: request.username.clone(),
                rank: Rank::Player,
                country: 0,
                restricted: false,
            })
        }
    }

    type TestServer = Server<AcceptAll, MemoryStore>;

    fn server() -> TestServer {
        Server::new(
            ServerConfig::default(),
            AcceptAll,
            Arc::new(MemoryStore::new()),
            JsonCodec,
        )
    }

    async fn login(server: &TestServer, username: &str) -> (Arc<Session>, OutboundReceiver) {
        let request = LoginRequest {
            username: username.into(),
            ..LoginRequest::default()
        };
        server.login(request, Location::default()).await.unwrap()
    }

    fn create_packet() -> Packet {
        let request = CreateMatchRequest {
            settings: MatchSettings {
                name: "late".into(),
                ..MatchSettings::default()
            },
            password: None,
        };
        Packet::encode(&JsonCodec, PacketKind::CreateMatch, &request).unwrap()
    }

    // =====================================================================
    // Requests still running when the session is replaced
    // =====================================================================

    #[tokio::test]
    async fn test_create_match_after_eviction_leaves_no_match_behind() {
        let server = server();
        let (old, _old_rx) = login(&server, "alice").await;
        let (new, _new_rx) = login(&server, "alice").await;
        assert!(old.is_evicted());

        create_match(&server, &old, &create_packet()).await.unwrap();

        assert!(server.matches().is_empty());
        assert_eq!(old.current_match(), None);
        assert_eq!(new.current_match(), None);
    }

    #[tokio::test]
    async fn test_join_match_after_eviction_releases_the_seat() {
        let server = server();
        let (bob, _bob_rx) = login(&server, "bob").await;
        create_match(&server, &bob, &create_packet()).await.unwrap();
        let match_id = bob.current_match().unwrap();
        let (old, _old_rx) = login(&server, "alice").await;
        let (_new, _new_rx) = login(&server, "alice").await;
        let request = JoinMatchRequest {
            match_id,
            password: None,
        };
        let packet = Packet::encode(&JsonCodec, PacketKind::JoinMatch, &request).unwrap();

        join_match(&server, &old, &packet).await.unwrap();

        let handle = server.matches().get(match_id).unwrap();
        assert!(!handle.lock().contains(UserId(1)));
        assert_eq!(handle.lock().occupants(), vec![UserId(2)]);
        assert_eq!(old.current_match(), None);
    }

    #[tokio::test]
    async fn test_create_match_after_logout_leaves_no_match_behind() {
        let server = server();
        let (alice, _rx) = login(&server, "alice").await;
        server.logout(&alice);

        create_match(&server, &alice, &create_packet()).await.unwrap();

        assert!(server.matches().is_empty());
        assert!(server.directory().is_empty());
    }
}
