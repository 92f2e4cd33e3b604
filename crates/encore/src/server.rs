//! Server state: login, logout, and everything handlers share.
//!
//! A [`Server`] ties the layers together: the session directory, the
//! match registry, the account authenticator, the score store, and the
//! payload codec. It is shared as `Arc<Server>` by every request task.
//! The transport (outside this crate) calls [`Server::login`] once per
//! client and then [`Server::dispatch`] for every packet the client sends.

use std::sync::Arc;

use encore_match::{MatchHandle, MatchRegistry, broadcast};
use encore_protocol::{Codec, GameMode, JsonCodec, MatchId, ServerPacket, UserId, UserStats};
use encore_scoring::{ClientFlags, RestrictionReason, ScoreStore, Submitter, apply_client_flags};
use encore_session::{
    Authenticator, ClientFingerprint, Location, LoginRequest, OutboundReceiver, Presence, Session,
    SessionDirectory, SessionError, UserAccount, generate_token,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::commands::CommandRegistry;
use crate::dispatch::HandlerRegistry;
use crate::{EncoreError, ServerConfig};

/// The running server's shared state.
///
/// Generic over the account authenticator `A`, the score store `S`, and
/// the payload codec `C` (JSON unless told otherwise).
pub struct Server<A, S, C = JsonCodec> {
    config: ServerConfig,
    directory: SessionDirectory,
    matches: MatchRegistry,
    auth: A,
    store: Arc<S>,
    codec: C,
    pub(crate) handlers: HandlerRegistry<A, S, C>,
    pub(crate) commands: CommandRegistry<A, S, C>,
}

impl<A, S, C> Server<A, S, C>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    /// Creates a server with every built-in packet handler and chat
    /// command registered.
    pub fn new(config: ServerConfig, auth: A, store: Arc<S>, codec: C) -> Self {
        let matches = MatchRegistry::new(config.matches.clone());
        Self {
            config,
            directory: SessionDirectory::new(),
            matches,
            auth,
            store,
            codec,
            handlers: HandlerRegistry::with_defaults(),
            commands: CommandRegistry::with_defaults(),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn directory(&self) -> &SessionDirectory {
        &self.directory
    }

    pub fn matches(&self) -> &MatchRegistry {
        &self.matches
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    // -- Login / logout ---------------------------------------------------

    /// Authenticates `request` and registers a new session for it.
    ///
    /// A previous session for the same user is evicted: it is told why,
    /// pulled out of its match, and never sees another packet. The new
    /// client gets its login reply, its own stats, and the presence of
    /// everyone online; everyone else gets the new client's presence.
    ///
    /// # Errors
    /// - `SessionError::AuthFailed`: the authenticator refused the login.
    /// - `SessionError::Restricted`: the account is restricted.
    pub async fn login(
        &self,
        request: LoginRequest,
        location: Location,
    ) -> Result<(Arc<Session>, OutboundReceiver), EncoreError> {
        let account = self.auth.authenticate(&request).await?;
        if account.restricted {
            tracing::info!(user_id = %account.id, "restricted account refused login");
            return Err(SessionError::Restricted(account.id).into());
        }

        let mut presence = Presence::new(
            Location {
                utc_offset: request.utc_offset,
                ..location
            },
            ClientFingerprint {
                version: request.client_version.clone(),
                client_hash: request.client_hash.clone(),
            },
        );
        presence.show_location = request.display_city;
        presence.block_non_friend_dms = request.block_non_friend_dms;

        let (session, outbound) = Session::new(account, generate_token(), presence);
        let session = Arc::new(session);
        if let Some(evicted) = self.directory.register(Arc::clone(&session)) {
            evicted.send(ServerPacket::Disconnected {
                reason: "logged in from another location".into(),
            });
            self.leave_current_match(&evicted);
        }

        session.send(ServerPacket::LoginReply { user_id: session.id() });
        session.send(self.user_data_packet(&session).await);

        let own_presence = self.presence_packet(&session).await;
        for other in self.directory.all() {
            if other.id() != session.id() {
                session.send(self.presence_packet(&other).await);
            }
            other.send(own_presence.clone());
        }

        tracing::info!(
            user_id = %session.id(),
            username = session.username(),
            client = %request.client_version,
            "player logged in"
        );
        Ok((session, outbound))
    }

    /// Registers the server's bot account. The bot never times out and
    /// its outbound queue is discarded.
    pub fn register_bot(&self, account: UserAccount) -> Arc<Session> {
        let (session, _outbound) = Session::new(account, generate_token(), Presence::bot());
        let session = Arc::new(session);
        self.directory.register(Arc::clone(&session));
        session
    }

    /// Logs `session` out: removes it from the directory, pulls it out of
    /// its match, and tells everyone else it left.
    ///
    /// Returns `false` if the session was already gone (a second logout,
    /// or a session that was evicted and cleaned up at login).
    pub fn logout(&self, session: &Arc<Session>) -> bool {
        if !self.directory.remove(session) {
            return false;
        }
        self.leave_current_match(session);
        self.send_to_all(&ServerPacket::UserLogout { user_id: session.id() });
        tracing::info!(user_id = %session.id(), "player logged out");
        true
    }

    /// Restricts `user_id` in the store and, if they're online, tells them
    /// and logs them out.
    pub async fn restrict(
        &self,
        user_id: UserId,
        moderator: Option<UserId>,
        reason: &str,
    ) -> Result<(), EncoreError> {
        self.store.restrict_user(user_id, moderator, reason).await?;
        tracing::warn!(%user_id, moderator = ?moderator, reason, "user restricted");
        if let Some(session) = self.directory.by_user_id(user_id) {
            session.send(ServerPacket::AccountRestricted);
            self.logout(&session);
        }
        Ok(())
    }

    /// Applies a client telemetry report for `session`, restricting and
    /// disconnecting it when the flags warrant.
    pub async fn report_client_flags(
        &self,
        session: &Arc<Session>,
        flags: ClientFlags,
    ) -> Result<Option<RestrictionReason>, EncoreError> {
        let reason = apply_client_flags(self.store.as_ref(), session.id(), flags).await?;
        if reason.is_some() {
            session.send(ServerPacket::AccountRestricted);
            self.logout(session);
        }
        Ok(reason)
    }

    /// The identity a score submission from `session` is checked against.
    pub fn submitter(&self, session: &Session) -> Submitter {
        let client = session.with_presence(|p| p.client.clone());
        Submitter {
            user_id: session.id(),
            username: session.username().to_owned(),
            client_version: client.version,
            client_hash: client.client_hash,
        }
    }

    // -- Background maintenance -------------------------------------------

    /// Spawns the timeout sweeper. Every `sweep_interval_secs` it logs out
    /// sessions that haven't pinged within the configured timeout. Runs
    /// until `cancel` fires.
    pub fn spawn_sweeper(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let server = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(server.config.sweep_interval());
            tracing::info!(
                interval_secs = server.config.sweep_interval_secs,
                timeout_secs = server.config.session.ping_timeout_secs,
                "session sweeper started"
            );
            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        tracing::info!("session sweeper stopped");
                        break;
                    }
                    _ = interval.tick() => {
                        server.sweep();
                    }
                }
            }
        })
    }

    /// Logs out every session past the ping timeout. Returns how many.
    pub fn sweep(&self) -> usize {
        let expired = self.directory.expire_stale(self.config.session.ping_timeout());
        for session in &expired {
            self.leave_current_match(session);
            self.send_to_all(&ServerPacket::UserLogout { user_id: session.id() });
        }
        expired.len()
    }

    // -- Shared helpers ---------------------------------------------------

    /// The match `session` currently occupies, if it still exists.
    pub fn current_match(&self, session: &Session) -> Option<MatchHandle> {
        session.current_match().and_then(|id| self.matches.get(id))
    }

    /// Takes `session` out of its current match, if any.
    pub fn leave_current_match(&self, session: &Session) {
        if let Some(match_id) = session.set_current_match(None) {
            self.leave_match(session.id(), match_id);
        }
    }

    /// Undoes match membership gained by a request that was still running
    /// when `session` left the directory. Returns `true` if the session is
    /// gone.
    ///
    /// Call after seating a session. Whoever removes a session marks it
    /// evicted before clearing its match, so either that cleanup sees the
    /// new seat or this check sees the eviction.
    pub(crate) fn release_if_evicted(&self, session: &Session) -> bool {
        if !session.is_evicted() {
            return false;
        }
        tracing::debug!(user_id = %session.id(), "session left mid-request, releasing seat");
        self.leave_current_match(session);
        true
    }

    /// Takes `user` out of `match_id` and tells whoever needs to know.
    ///
    /// An emptied match is removed from the registry while its lock is
    /// still held, so a concurrent join can't land in a disposed match.
    pub(crate) fn leave_match(&self, user: UserId, match_id: MatchId) {
        let Some(handle) = self.matches.get(match_id) else {
            return;
        };

        let outcome = {
            let mut game = handle.lock();
            let outcome = game.leave(user);
            if matches!(outcome, Ok(o) if o.empty) {
                self.matches.remove(match_id);
            }
            outcome
        };
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::debug!(user_id = %user, %match_id, error = %e, "leave failed");
                return;
            }
        };

        if outcome.empty {
            tracing::info!(%match_id, "empty match disposed");
            self.send_to_all(&ServerPacket::MatchDisposed { match_id });
            return;
        }
        if let Some(new_host) = outcome.new_host {
            if let Some(host) = self.directory.by_user_id(new_host) {
                host.send(ServerPacket::MatchTransferHost);
            }
        }
        broadcast(&handle, &self.directory);
    }

    /// Sends `packet` to every connected session.
    pub fn send_to_all(&self, packet: &ServerPacket) -> usize {
        self.directory
            .all()
            .iter()
            .filter(|s| s.send(packet.clone()))
            .count()
    }

    /// Global rank in `mode`, `0` when unranked or the store fails.
    pub async fn global_rank(&self, user_id: UserId, mode: GameMode) -> u32 {
        match self.store.user_rank(user_id, mode).await {
            Ok(rank) => rank.unwrap_or(0),
            Err(e) => {
                tracing::warn!(%user_id, error = %e, "rank lookup failed");
                0
            }
        }
    }

    pub async fn presence_packet(&self, session: &Session) -> ServerPacket {
        let rank = self.global_rank(session.id(), session.current_mode()).await;
        ServerPacket::Presence(session.with_presence(|p| p.presence_view(session.account(), rank)))
    }

    /// Stats for `session`'s current mode, fetched from the store.
    pub async fn user_data_packet(&self, session: &Session) -> ServerPacket {
        let mode = session.current_mode();
        let stats = match self.store.user_stats(session.id(), mode).await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::warn!(user_id = %session.id(), error = %e, "stats lookup failed");
                UserStats::empty(session.id(), mode)
            }
        };
        let rank = self.global_rank(session.id(), mode).await;
        ServerPacket::UserData(session.with_presence(|p| p.data_view(session.id(), &stats, rank)))
    }

    /// The id the bot speaks as; `UserId::default()` when no bot is
    /// registered.
    pub fn bot_id(&self) -> UserId {
        self.directory
            .by_username(&self.config.bot_name)
            .map(|bot| bot.id())
            .unwrap_or_default()
    }
}
