//! Handlers for pings, status changes, and presence lookups.

use std::sync::Arc;

use encore_protocol::{AwayMessage, Codec, Packet, ServerPacket, Status, Toggle, UserIdList};
use encore_scoring::ScoreStore;
use encore_session::{Authenticator, Session};

use crate::{EncoreError, Server};

pub(crate) async fn ping<A, S, C>(
    _server: &Server<A, S, C>,
    session: &Arc<Session>,
    _packet: &Packet,
) -> Result<(), EncoreError>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    session.send(ServerPacket::Pong);
    Ok(())
}

/// Stores the new status and shows everyone the updated stats (the mode
/// may have changed, and with it the stats and rank).
pub(crate) async fn change_action<A, S, C>(
    server: &Server<A, S, C>,
    session: &Arc<Session>,
    packet: &Packet,
) -> Result<(), EncoreError>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    let status: Status = packet.decode(server.codec())?;
    tracing::trace!(
        user_id = %session.id(),
        action = ?status.action,
        mode = ?status.mode,
        "status changed"
    );
    session.update_presence(|p| p.status = status);

    let data = server.user_data_packet(session).await;
    server.send_to_all(&data);
    Ok(())
}

pub(crate) async fn logout<A, S, C>(
    server: &Server<A, S, C>,
    session: &Arc<Session>,
    _packet: &Packet,
) -> Result<(), EncoreError>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    server.logout(session);
    Ok(())
}

pub(crate) async fn request_status_update<A, S, C>(
    server: &Server<A, S, C>,
    session: &Arc<Session>,
    _packet: &Packet,
) -> Result<(), EncoreError>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    session.send(server.user_data_packet(session).await);
    Ok(())
}

/// Stats for each requested user that is online. Offline ids are skipped.
pub(crate) async fn user_stats_request<A, S, C>(
    server: &Server<A, S, C>,
    session: &Arc<Session>,
    packet: &Packet,
) -> Result<(), EncoreError>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    let request: UserIdList = packet.decode(server.codec())?;
    for user_id in request.ids {
        if user_id == session.id() {
            continue;
        }
        if let Some(other) = server.directory().by_user_id(user_id) {
            session.send(server.user_data_packet(&other).await);
        }
    }
    Ok(())
}

pub(crate) async fn user_presence_request<A, S, C>(
    server: &Server<A, S, C>,
    session: &Arc<Session>,
    packet: &Packet,
) -> Result<(), EncoreError>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    let request: UserIdList = packet.decode(server.codec())?;
    for user_id in request.ids {
        if let Some(other) = server.directory().by_user_id(user_id) {
            session.send(server.presence_packet(&other).await);
        }
    }
    Ok(())
}

pub(crate) async fn presence_request_all<A, S, C>(
    server: &Server<A, S, C>,
    session: &Arc<Session>,
    _packet: &Packet,
) -> Result<(), EncoreError>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    for other in server.directory().all() {
        if other.id() != session.id() {
            session.send(server.presence_packet(&other).await);
        }
    }
    Ok(())
}

/// Sets or clears (empty text) the away message.
pub(crate) async fn set_away_message<A, S, C>(
    server: &Server<A, S, C>,
    session: &Arc<Session>,
    packet: &Packet,
) -> Result<(), EncoreError>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    let away: AwayMessage = packet.decode(server.codec())?;
    let text = away.text.filter(|t| !t.trim().is_empty());
    let notice = match &text {
        Some(text) => format!("Away message set to: {text}"),
        None => "Away message removed.".to_owned(),
    };
    session.update_presence(|p| p.away_message = text);
    session.send(ServerPacket::Notification { text: notice });
    Ok(())
}

pub(crate) async fn toggle_block_dms<A, S, C>(
    server: &Server<A, S, C>,
    session: &Arc<Session>,
    packet: &Packet,
) -> Result<(), EncoreError>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    let toggle: Toggle = packet.decode(server.codec())?;
    session.update_presence(|p| p.block_non_friend_dms = toggle.enabled);
    Ok(())
}
