//! Public and private chat.
//!
//! Messages are relayed with the sender fields filled in by the server,
//! never trusted from the client. Text starting with the command prefix
//! is also handed to the command dispatcher; private messages to the bot
//! are always commands.

use std::sync::Arc;

use encore_protocol::{ChatMessage, Codec, Packet, Rank, ServerPacket};
use encore_scoring::ScoreStore;
use encore_session::{Authenticator, Session, SessionError};

use crate::commands::CommandOutput;
use crate::{EncoreError, Server};

/// The channel that reaches the sender's current match.
pub(crate) const MULTIPLAYER_CHANNEL: &str = "#multiplayer";

pub(crate) async fn public_message<A, S, C>(
    server: &Server<A, S, C>,
    session: &Arc<Session>,
    packet: &Packet,
) -> Result<(), EncoreError>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    let mut message: ChatMessage = packet.decode(server.codec())?;
    if message.text.trim().is_empty() {
        return Ok(());
    }
    message.sender = session.username().to_owned();
    message.sender_id = session.id();

    let audience = channel_audience(server, session, &message.target);
    let chat = ServerPacket::Chat(message.clone());
    for other in audience.iter().filter(|s| s.id() != session.id()) {
        other.send(chat.clone());
    }

    let Some(line) = message.text.strip_prefix(server.config().command_prefix.as_str()) else {
        return Ok(());
    };
    match server.run_command(session, line).await {
        Some(CommandOutput::Reply(text)) => {
            let reply = ServerPacket::Chat(bot_message(server, &message.target, text));
            for member in &audience {
                member.send(reply.clone());
            }
        }
        Some(CommandOutput::Private(text)) => {
            session.send(ServerPacket::Chat(bot_message(server, &message.target, text)));
        }
        None => {}
    }
    Ok(())
}

pub(crate) async fn private_message<A, S, C>(
    server: &Server<A, S, C>,
    session: &Arc<Session>,
    packet: &Packet,
) -> Result<(), EncoreError>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    let mut message: ChatMessage = packet.decode(server.codec())?;
    if message.text.trim().is_empty() {
        return Ok(());
    }
    message.sender = session.username().to_owned();
    message.sender_id = session.id();

    if message.target.eq_ignore_ascii_case(&server.config().bot_name) {
        let prefix = server.config().command_prefix.as_str();
        let line = message.text.strip_prefix(prefix).unwrap_or(&message.text);
        let output = server.run_command(session, line).await;
        if let Some(CommandOutput::Reply(text) | CommandOutput::Private(text)) = output {
            session.send(ServerPacket::Chat(bot_message(server, session.username(), text)));
        }
        return Ok(());
    }

    let recipient = server
        .directory()
        .by_username(&message.target)
        .ok_or_else(|| SessionError::UnknownUsername(message.target.clone()))?;

    let (blocks_dms, away_message) =
        recipient.with_presence(|p| (p.block_non_friend_dms, p.away_message.clone()));
    if blocks_dms && !session.rank().meets(Rank::SuperMod) {
        session.send(ServerPacket::Notification {
            text: format!("{} is only accepting messages from friends.", recipient.username()),
        });
        return Ok(());
    }

    recipient.send(ServerPacket::Chat(message.clone()));
    if let Some(away) = away_message {
        session.send(ServerPacket::Chat(ChatMessage {
            sender: recipient.username().to_owned(),
            sender_id: recipient.id(),
            target: session.username().to_owned(),
            text: format!("(away) {away}"),
        }));
    }

    if let Some(line) = message.text.strip_prefix(server.config().command_prefix.as_str()) {
        let output = server.run_command(session, line).await;
        if let Some(CommandOutput::Reply(text) | CommandOutput::Private(text)) = output {
            session.send(ServerPacket::Chat(bot_message(server, session.username(), text)));
        }
    }
    Ok(())
}

/// Who hears a message sent to `target`: the sender's match for
/// `#multiplayer`, everyone online for any other channel.
fn channel_audience<A, S, C>(
    server: &Server<A, S, C>,
    session: &Session,
    target: &str,
) -> Vec<Arc<Session>>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    if target != MULTIPLAYER_CHANNEL {
        return server.directory().all();
    }
    let Some(handle) = server.current_match(session) else {
        return Vec::new();
    };
    let occupants = handle.lock().occupants();
    occupants
        .into_iter()
        .filter_map(|user| server.directory().by_user_id(user))
        .collect()
}

fn bot_message<A, S, C>(server: &Server<A, S, C>, target: &str, text: String) -> ChatMessage
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    ChatMessage {
        sender: server.config().bot_name.clone(),
        sender_id: server.bot_id(),
        target: target.to_owned(),
        text,
    }
}
