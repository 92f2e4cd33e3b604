//! Presence: the mutable attributes attached to a connected player.
//!
//! A [`Presence`] is plain data. It never looks anything up itself: the
//! global rank shown on a presence card depends on every other player's
//! stats, so callers ask the store for it and pass it in.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use encore_protocol::{GameMode, PresenceView, Status, UserDataView, UserId, UserStats};

use crate::UserAccount;

/// Where the player says they are.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Location {
    pub latitude: f32,
    pub longitude: f32,
    /// Numeric country code. `0` means unknown; the account's country is
    /// used instead.
    pub country: u8,
    pub utc_offset: i8,
}

/// Identifies the client build a session logged in with. Score
/// submissions are checked against it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClientFingerprint {
    pub version: String,
    pub client_hash: String,
}

/// The mutable attributes of one connected player.
#[derive(Debug, Clone)]
pub struct Presence {
    pub status: Status,
    pub location: Location,
    /// When `false`, latitude and longitude are zeroed in presence views.
    pub show_location: bool,
    pub away_message: Option<String>,
    pub bot: bool,
    pub client: ClientFingerprint,
    pub block_non_friend_dms: bool,
    pub login_time: DateTime<Utc>,
    pub(crate) last_ping: Instant,
}

impl Presence {
    /// Presence for a freshly logged-in player.
    pub fn new(location: Location, client: ClientFingerprint) -> Self {
        Self {
            status: Status::default(),
            location,
            show_location: true,
            away_message: None,
            bot: false,
            client,
            block_non_friend_dms: false,
            login_time: Utc::now(),
            last_ping: Instant::now(),
        }
    }

    /// Presence for the server's own bot account.
    pub fn bot() -> Self {
        Self {
            bot: true,
            ..Self::new(Location::default(), ClientFingerprint::default())
        }
    }

    /// Records that the client just pinged.
    pub fn touch_ping(&mut self) {
        self.last_ping = Instant::now();
    }

    /// Time since the last ping.
    pub fn since_last_ping(&self) -> Duration {
        self.last_ping.elapsed()
    }

    /// The game mode in the player's current status.
    pub fn current_mode(&self) -> GameMode {
        self.status.mode
    }

    /// The presence card other players see.
    pub fn presence_view(&self, account: &UserAccount, global_rank: u32) -> PresenceView {
        let (latitude, longitude) = if self.show_location {
            (self.location.latitude, self.location.longitude)
        } else {
            (0.0, 0.0)
        };
        let country = match self.location.country {
            0 => account.country,
            code => code,
        };

        PresenceView {
            user_id: account.id,
            username: account.username.clone(),
            utc_offset: self.location.utc_offset,
            country,
            privileges: account.rank,
            mode: self.current_mode(),
            latitude,
            longitude,
            global_rank: if self.bot { 0 } else { global_rank },
        }
    }

    /// Statistics for the current mode, in the shape the client expects.
    ///
    /// `stats.accuracy` is a percentage; the client wants a fraction.
    pub fn data_view(&self, user_id: UserId, stats: &UserStats, global_rank: u32) -> UserDataView {
        if self.bot {
            return UserDataView {
                user_id,
                status: self.status.clone(),
                ranked_score: 0,
                accuracy: 0.0,
                play_count: 0,
                total_score: 0,
                global_rank: 0,
                performance: 0,
            };
        }

        UserDataView {
            user_id,
            status: self.status.clone(),
            ranked_score: stats.ranked_score,
            accuracy: (stats.accuracy / 100.0) as f32,
            play_count: stats.play_count,
            total_score: stats.total_score,
            global_rank,
            performance: stats.performance.round() as u32,
        }
    }
}
