//! Chat commands.
//!
//! A line like `!mp host alice` is split into words. If the first word
//! names a command group (`mp`), the second word picks the command within
//! it; otherwise the first word is the command. Unknown commands and
//! commands above the issuer's rank are ignored without a reply.
//!
//! Commands go through the same match and store APIs as packet handlers
//! and never surface errors: failures become a reply to the issuer.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use encore_match::{MatchError, MatchHandle};
use encore_protocol::{Codec, Rank, UserId};
use encore_scoring::ScoreStore;
use encore_session::{Authenticator, Session};

use crate::handlers::multiplayer;
use crate::Server;

/// Why a command produced no normal reply.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// The arguments didn't parse. The issuer gets the usage line.
    #[error("malformed arguments")]
    Usage,

    /// The command ran and was refused. The text goes to the issuer.
    #[error("{0}")]
    Failed(String),
}

/// What the chat layer should send back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutput {
    /// Shown to everyone who saw the command.
    Reply(String),
    /// Shown to the issuer only.
    Private(String),
}

/// The arguments a command runs with.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub args: Vec<String>,
    /// The issuer's current match, if any.
    pub game: Option<MatchHandle>,
}

pub type CommandFuture<'a> =
    Pin<Box<dyn Future<Output = Result<String, CommandError>> + Send + 'a>>;

pub type CommandFn<A, S, C> =
    for<'a> fn(&'a Server<A, S, C>, &'a Arc<Session>, &'a Invocation) -> CommandFuture<'a>;

/// A registered command.
pub struct Command<A, S, C> {
    pub name: &'static str,
    /// `Some("mp")` for `!mp <name>`.
    pub group: Option<&'static str>,
    pub min_rank: Rank,
    pub needs_match: bool,
    /// Shown after the prefix on malformed input, e.g. `roll [max]`.
    pub usage: &'static str,
    pub run: CommandFn<A, S, C>,
}

macro_rules! command {
    ($run:path) => {
        |server, session, invocation| Box::pin($run(server, session, invocation))
    };
}

/// Every command the server understands.
pub struct CommandRegistry<A, S, C> {
    commands: Vec<Command<A, S, C>>,
}

impl<A, S, C> CommandRegistry<A, S, C>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    pub fn new() -> Self {
        Self { commands: Vec::new() }
    }

    /// A registry with the built-in commands.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Command {
            name: "help",
            group: None,
            min_rank: Rank::Player,
            needs_match: false,
            usage: "help",
            run: command!(help),
        });
        registry.register(Command {
            name: "roll",
            group: None,
            min_rank: Rank::Player,
            needs_match: false,
            usage: "roll [max]",
            run: command!(roll),
        });
        registry.register(Command {
            name: "restrict",
            group: None,
            min_rank: Rank::SuperMod,
            needs_match: false,
            usage: "restrict <user id> <reason>",
            run: command!(restrict),
        });
        registry.register(Command {
            name: "host",
            group: Some("mp"),
            min_rank: Rank::Player,
            needs_match: true,
            usage: "mp host <username>",
            run: command!(mp_host),
        });
        registry.register(Command {
            name: "password",
            group: Some("mp"),
            min_rank: Rank::Player,
            needs_match: true,
            usage: "mp password [password]",
            run: command!(mp_password),
        });
        registry.register(Command {
            name: "start",
            group: Some("mp"),
            min_rank: Rank::Player,
            needs_match: true,
            usage: "mp start",
            run: command!(mp_start),
        });
        registry.register(Command {
            name: "abort",
            group: Some("mp"),
            min_rank: Rank::Player,
            needs_match: true,
            usage: "mp abort",
            run: command!(mp_abort),
        });
        registry
    }

    /// Adds a command, replacing one with the same group and name.
    pub fn register(&mut self, command: Command<A, S, C>) {
        self.commands
            .retain(|c| !(c.group == command.group && c.name == command.name));
        self.commands.push(command);
    }

    pub fn find(&self, group: Option<&str>, name: &str) -> Option<&Command<A, S, C>> {
        self.commands
            .iter()
            .find(|c| c.group == group && c.name.eq_ignore_ascii_case(name))
    }

    pub fn is_group(&self, word: &str) -> bool {
        self.commands
            .iter()
            .any(|c| c.group.is_some_and(|g| g.eq_ignore_ascii_case(word)))
    }

    /// Commands available to `rank`, in registration order.
    pub fn available_to(&self, rank: Rank) -> impl Iterator<Item = &Command<A, S, C>> {
        self.commands.iter().filter(move |c| rank.meets(c.min_rank))
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Splits `line` (prefix already stripped) into a command and its
    /// arguments.
    fn resolve<'r>(&'r self, line: &str) -> Option<(&'r Command<A, S, C>, Vec<String>)> {
        let mut words = line.split_whitespace();
        let first = words.next()?;
        let rest: Vec<String> = words.map(str::to_owned).collect();

        if self.is_group(first) {
            let (name, args) = rest.split_first()?;
            let command = self.find(Some(first.to_ascii_lowercase().as_str()), name)?;
            Some((command, args.to_vec()))
        } else {
            Some((self.find(None, first)?, rest))
        }
    }
}

impl<A, S, C> Default for CommandRegistry<A, S, C>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Server entry points
// ---------------------------------------------------------------------------

impl<A, S, C> Server<A, S, C>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    /// Runs the command in `line` (without the prefix) for `session`.
    /// `None` means nothing should be sent back.
    pub async fn run_command(&self, session: &Arc<Session>, line: &str) -> Option<CommandOutput> {
        let (command, args) = self.commands.resolve(line)?;
        if !session.rank().meets(command.min_rank) {
            tracing::debug!(
                user_id = %session.id(),
                command = command.name,
                rank = %session.rank(),
                "command above issuer's rank"
            );
            return None;
        }

        let game = self.current_match(session);
        if command.needs_match && game.is_none() {
            return Some(CommandOutput::Private(
                "This command only works inside a match.".to_owned(),
            ));
        }

        tracing::info!(
            user_id = %session.id(),
            command = command.name,
            args = ?args,
            "running command"
        );
        let invocation = Invocation { args, game };
        match (command.run)(self, session, &invocation).await {
            Ok(text) => Some(CommandOutput::Reply(text)),
            Err(CommandError::Usage) => Some(CommandOutput::Private(format!(
                "Usage: {}{}",
                self.config().command_prefix,
                command.usage
            ))),
            Err(CommandError::Failed(text)) => Some(CommandOutput::Private(text)),
        }
    }

    /// Registers or replaces a chat command. Call before sharing the
    /// server.
    pub fn register_command(&mut self, command: Command<A, S, C>) {
        self.commands.register(command);
    }
}

// ---------------------------------------------------------------------------
// Built-in commands
// ---------------------------------------------------------------------------

async fn help<A, S, C>(
    server: &Server<A, S, C>,
    session: &Arc<Session>,
    _invocation: &Invocation,
) -> Result<String, CommandError>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    let prefix = &server.config().command_prefix;
    let listed: Vec<String> = server
        .commands
        .available_to(session.rank())
        .map(|c| format!("{prefix}{}", c.usage))
        .collect();
    Ok(format!("Commands: {}", listed.join(", ")))
}

async fn roll<A, S, C>(
    _server: &Server<A, S, C>,
    session: &Arc<Session>,
    invocation: &Invocation,
) -> Result<String, CommandError>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    let max = match invocation.args.first() {
        None => 100,
        Some(arg) => arg.parse::<u64>().map_err(|_| CommandError::Usage)?,
    };
    let points = rand::random_range(0..=max);
    let unit = if points == 1 { "point" } else { "points" };
    Ok(format!("{} rolls {points} {unit}!", session.username()))
}

async fn restrict<A, S, C>(
    server: &Server<A, S, C>,
    session: &Arc<Session>,
    invocation: &Invocation,
) -> Result<String, CommandError>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    let (target, reason) = invocation.args.split_first().ok_or(CommandError::Usage)?;
    let target = UserId(target.parse().map_err(|_| CommandError::Usage)?);
    let reason = reason.join(" ");
    if !(3..=256).contains(&reason.chars().count()) {
        return Err(CommandError::Usage);
    }

    let user = server
        .store()
        .user(target)
        .await
        .map_err(|e| internal(session, "restrict", &e))?
        .ok_or_else(|| CommandError::Failed(format!("No user with id {}.", target.0)))?;
    if user.rank.meets(Rank::SuperMod) {
        return Err(CommandError::Failed(format!(
            "{} is staff and can't be restricted.",
            user.username
        )));
    }
    if user.restricted {
        return Err(CommandError::Failed(format!("{} is already restricted.", user.username)));
    }

    server
        .restrict(target, Some(session.id()), &reason)
        .await
        .map_err(|e| internal(session, "restrict", &e))?;
    Ok(format!("{} has been restricted.", user.username))
}

async fn mp_host<A, S, C>(
    server: &Server<A, S, C>,
    session: &Arc<Session>,
    invocation: &Invocation,
) -> Result<String, CommandError>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    let game = current_game(invocation)?;
    let username = invocation.args.join(" ");
    if username.is_empty() {
        return Err(CommandError::Usage);
    }

    let target = server
        .directory()
        .by_username(&username)
        .ok_or_else(|| CommandError::Failed(format!("{username} isn't online.")))?;
    let slot = game
        .lock()
        .slot_of(target.id())
        .ok_or_else(|| {
            CommandError::Failed(format!("{} isn't in this match.", target.username()))
        })?;

    multiplayer::transfer_host_to(server, game, session.id(), slot).map_err(refused)?;
    Ok(format!("{} is now the host.", target.username()))
}

async fn mp_password<A, S, C>(
    server: &Server<A, S, C>,
    session: &Arc<Session>,
    invocation: &Invocation,
) -> Result<String, CommandError>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    let game = current_game(invocation)?;
    let password = Some(invocation.args.join(" ")).filter(|p| !p.is_empty());
    let reply = if password.is_some() {
        "Match password changed."
    } else {
        "Match password removed."
    };

    multiplayer::set_password(server, game, session.id(), password).map_err(refused)?;
    Ok(reply.to_owned())
}

async fn mp_start<A, S, C>(
    server: &Server<A, S, C>,
    session: &Arc<Session>,
    invocation: &Invocation,
) -> Result<String, CommandError>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    let game = current_game(invocation)?;
    let players = multiplayer::start_match(server, game, session.id()).map_err(refused)?;
    Ok(format!("Match started with {} players.", players.len()))
}

async fn mp_abort<A, S, C>(
    server: &Server<A, S, C>,
    session: &Arc<Session>,
    invocation: &Invocation,
) -> Result<String, CommandError>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    let game = current_game(invocation)?;
    multiplayer::abort_match(server, game, session.id()).map_err(refused)?;
    Ok("Match aborted.".to_owned())
}

fn current_game(invocation: &Invocation) -> Result<&MatchHandle, CommandError> {
    invocation
        .game
        .as_ref()
        .ok_or_else(|| CommandError::Failed("This command only works inside a match.".to_owned()))
}

fn refused(error: MatchError) -> CommandError {
    match error {
        MatchError::NotHost(..) => CommandError::Failed("Only the host can do that.".to_owned()),
        other => CommandError::Failed(other.to_string()),
    }
}

fn internal(session: &Session, command: &str, error: &dyn std::error::Error) -> CommandError {
    tracing::warn!(user_id = %session.id(), command, error = %error, "command failed");
    CommandError::Failed("Something went wrong, try again later.".to_owned())
}

#[cfg(test)]
mod tests {
    use encore_protocol::JsonCodec;
    use encore_scoring::memory::MemoryStore;
    use encore_session::{LoginRequest, SessionError, UserAccount};

    use super::*;

    struct NoAuth;

    impl Authenticator for NoAuth {
        async fn authenticate(&self, request: &LoginRequest) -> Result<UserAccount, SessionError> {
            Err(SessionError::AuthFailed(request.username.clone()))
        }
    }

    type Registry = CommandRegistry<NoAuth, MemoryStore, JsonCodec>;

    #[test]
    fn test_resolve_plain_command_keeps_arguments() {
        let registry = Registry::with_defaults();
        let (command, args) = registry.resolve("roll 20").unwrap();

        assert_eq!(command.name, "roll");
        assert_eq!(args, vec!["20".to_owned()]);
    }

    #[test]
    fn test_resolve_group_command_is_case_insensitive() {
        let registry = Registry::with_defaults();
        let (command, args) = registry.resolve("MP Host alice smith").unwrap();

        assert_eq!(command.group, Some("mp"));
        assert_eq!(command.name, "host");
        assert_eq!(args, vec!["alice".to_owned(), "smith".to_owned()]);
    }

    #[test]
    fn test_resolve_unknown_or_bare_group_is_none() {
        let registry = Registry::with_defaults();

        assert!(registry.resolve("dance").is_none());
        assert!(registry.resolve("mp").is_none());
        assert!(registry.resolve("mp dance").is_none());
        assert!(registry.resolve("   ").is_none());
    }

    #[test]
    fn test_available_to_player_hides_staff_commands() {
        let registry = Registry::with_defaults();

        let player: Vec<_> = registry.available_to(Rank::Player).map(|c| c.name).collect();
        let staff: Vec<_> = registry.available_to(Rank::SuperMod).map(|c| c.name).collect();

        assert!(!player.contains(&"restrict"));
        assert!(staff.contains(&"restrict"));
    }

    #[test]
    fn test_register_same_name_replaces() {
        let mut registry = Registry::with_defaults();
        let before = registry.len();
        registry.register(Command {
            name: "roll",
            group: None,
            min_rank: Rank::Developer,
            needs_match: false,
            usage: "roll",
            run: command!(roll),
        });

        assert_eq!(registry.len(), before);
        assert_eq!(registry.find(None, "roll").unwrap().min_rank, Rank::Developer);
    }
}
