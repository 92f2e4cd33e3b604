//! The match state machine: one multiplayer room and its slot table.
//!
//! A [`Match`] is plain data guarded by its own mutex (see
//! [`MatchHandle`](crate::MatchHandle)). Every operation follows the same
//! shape:
//!
//! 1. check every precondition (membership, host privilege, slot index,
//!    status), returning `Err` without touching anything;
//! 2. apply the mutation;
//! 3. bump the modification counter so stale snapshots can be dropped.
//!
//! ```text
//!          start()
//!   Idle ───────────→ Playing
//!    ↑                   │
//!    └───────────────────┘
//!   abort() / every playing slot completed / last player left
//! ```

use encore_protocol::{
    MatchId, MatchSettings, MatchSnapshot, MatchStatus, Mods, Occupancy, SlotView, Team, UserId,
};

use crate::{MatchConfig, MatchError};

// ---------------------------------------------------------------------------
// Slot
// ---------------------------------------------------------------------------

/// One seat in a match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Slot {
    pub user: Option<UserId>,
    pub occupancy: Occupancy,
    pub ready: bool,
    pub has_beatmap: bool,
    pub team: Team,
    /// Per-player mods (only meaningful with free mods).
    pub mods: Mods,
    pub playing: bool,
    pub loaded: bool,
    pub skipped: bool,
    pub completed: bool,
    pub failed: bool,
}

impl Slot {
    pub fn is_free(&self) -> bool {
        self.occupancy == Occupancy::Free
    }

    pub fn is_occupied(&self) -> bool {
        self.user.is_some()
    }

    /// Empties the slot, keeping its lock state.
    fn clear(&mut self) {
        let occupancy = match self.occupancy {
            Occupancy::Locked => Occupancy::Locked,
            _ => Occupancy::Free,
        };
        *self = Slot {
            occupancy,
            ..Slot::default()
        };
    }

    fn seat(&mut self, user: UserId, team: Team) {
        *self = Slot {
            user: Some(user),
            occupancy: Occupancy::Occupied,
            has_beatmap: true,
            team,
            ..Slot::default()
        };
    }

    fn reset_play_state(&mut self) {
        self.playing = false;
        self.loaded = false;
        self.skipped = false;
        self.completed = false;
        self.failed = false;
    }

    fn view(&self) -> SlotView {
        SlotView {
            occupancy: self.occupancy,
            user_id: self.user,
            ready: self.ready,
            has_beatmap: self.has_beatmap,
            team: self.team,
            mods: self.mods,
            playing: self.playing,
            completed: self.completed,
        }
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// What happened when a player left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaveOutcome {
    /// The slot the player vacated.
    pub slot: usize,
    /// Set when the leaver was host and someone else took over.
    pub new_host: Option<UserId>,
    /// No occupants remain; the caller should remove the match.
    pub empty: bool,
    /// The leaver was the last unfinished player and the match returned
    /// to `Idle`.
    pub finished: bool,
}

/// What happened when a player asked to skip the intro.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkipOutcome {
    pub slot: usize,
    /// Every playing slot has now skipped.
    pub all_skipped: bool,
}

// ---------------------------------------------------------------------------
// Match
// ---------------------------------------------------------------------------

/// A multiplayer match.
///
/// Invariants:
/// - exactly one host while any slot is occupied, and the host occupies
///   a slot;
/// - a user occupies at most one slot;
/// - `seq` increases on every successful mutation.
#[derive(Debug, Clone)]
pub struct Match {
    id: MatchId,
    password: Option<String>,
    host: UserId,
    creator: UserId,
    status: MatchStatus,
    settings: MatchSettings,
    mods: Mods,
    seed: i32,
    slots: Vec<Slot>,
    seq: u64,
}

impl Match {
    /// Creates a match with `host` seated in slot 0.
    pub fn new(
        id: MatchId,
        host: UserId,
        mut settings: MatchSettings,
        password: Option<String>,
        config: &MatchConfig,
    ) -> Self {
        settings.name = truncate_name(&settings.name, config.max_name_len);
        let mut slots = vec![Slot::default(); config.slot_count.max(1)];
        slots[0].seat(host, default_team(&settings));

        Self {
            id,
            password: normalize_password(password),
            host,
            creator: host,
            status: MatchStatus::Idle,
            settings,
            mods: Mods::NONE,
            seed: rand::random(),
            slots,
            seq: 1,
        }
    }

    // -- Accessors --------------------------------------------------------

    pub fn id(&self) -> MatchId {
        self.id
    }

    pub fn host(&self) -> UserId {
        self.host
    }

    pub fn creator(&self) -> UserId {
        self.creator
    }

    pub fn status(&self) -> MatchStatus {
        self.status
    }

    pub fn settings(&self) -> &MatchSettings {
        &self.settings
    }

    pub fn mods(&self) -> Mods {
        self.mods
    }

    pub fn seed(&self) -> i32 {
        self.seed
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn slot(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    /// The slot index `user` occupies, if any.
    pub fn slot_of(&self, user: UserId) -> Option<usize> {
        self.slots.iter().position(|s| s.user == Some(user))
    }

    pub fn contains(&self, user: UserId) -> bool {
        self.slot_of(user).is_some()
    }

    pub fn is_host(&self, user: UserId) -> bool {
        self.host == user
    }

    /// Every occupant, in slot order.
    pub fn occupants(&self) -> Vec<UserId> {
        self.slots.iter().filter_map(|s| s.user).collect()
    }

    /// Occupants of slots that are in the current play.
    pub fn playing(&self) -> Vec<UserId> {
        self.slots
            .iter()
            .filter(|s| s.playing)
            .filter_map(|s| s.user)
            .collect()
    }

    pub fn player_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_occupied()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.player_count() == 0
    }

    /// A broadcastable copy. The password is replaced by a flag.
    pub fn snapshot(&self) -> MatchSnapshot {
        MatchSnapshot {
            match_id: self.id,
            host: self.host,
            has_password: self.password.is_some(),
            status: self.status,
            settings: self.settings.clone(),
            mods: self.mods,
            slots: self.slots.iter().map(Slot::view).collect(),
            seq: self.seq,
        }
    }

    // -- Precondition helpers ---------------------------------------------

    fn require_slot_of(&self, user: UserId) -> Result<usize, MatchError> {
        self.slot_of(user)
            .ok_or(MatchError::NotInMatch(user, self.id))
    }

    fn require_host(&self, issuer: UserId) -> Result<(), MatchError> {
        if self.host != issuer {
            return Err(MatchError::NotHost(issuer, self.id));
        }
        Ok(())
    }

    fn require_slot_index(&self, index: usize) -> Result<(), MatchError> {
        if index >= self.slots.len() {
            return Err(MatchError::InvalidSlot(index));
        }
        Ok(())
    }

    fn require_status(&self, status: MatchStatus, reason: &'static str) -> Result<(), MatchError> {
        if self.status != status {
            return Err(MatchError::InvalidState {
                match_id: self.id,
                status: self.status,
                reason,
            });
        }
        Ok(())
    }

    /// The playing slot of `user`, or an error.
    fn require_playing_slot(&self, user: UserId) -> Result<usize, MatchError> {
        let index = self.require_slot_of(user)?;
        self.require_status(MatchStatus::Playing, "not in progress")?;
        if !self.slots[index].playing {
            return Err(MatchError::InvalidState {
                match_id: self.id,
                status: self.status,
                reason: "player is not playing",
            });
        }
        Ok(index)
    }

    fn touch(&mut self) {
        self.seq += 1;
    }

    // -- Membership -------------------------------------------------------

    /// Seats `user` in the lowest-indexed free slot and returns its index.
    ///
    /// # Errors
    /// - [`MatchError::AlreadyInMatch`]
    /// - [`MatchError::WrongPassword`]: the match has a password and
    ///   `password` isn't exactly equal (case-sensitive).
    /// - [`MatchError::Full`]
    pub fn join(&mut self, user: UserId, password: Option<&str>) -> Result<usize, MatchError> {
        if self.contains(user) {
            return Err(MatchError::AlreadyInMatch(user, self.id));
        }
        if let Some(expected) = &self.password {
            if password != Some(expected.as_str()) {
                return Err(MatchError::WrongPassword(self.id));
            }
        }
        let index = self
            .slots
            .iter()
            .position(Slot::is_free)
            .ok_or(MatchError::Full(self.id))?;

        let team = default_team(&self.settings);
        self.slots[index].seat(user, team);
        if self.host_missing() {
            self.host = user;
        }
        self.touch();
        tracing::debug!(match_id = %self.id, user_id = %user, slot = index, "player joined match");
        Ok(index)
    }

    /// Removes `user` from the match.
    ///
    /// If the host leaves, host passes to the lowest-indexed remaining
    /// occupant. If the leaver was the last unfinished player, the match
    /// returns to `Idle`.
    pub fn leave(&mut self, user: UserId) -> Result<LeaveOutcome, MatchError> {
        let index = self.require_slot_of(user)?;

        self.slots[index].clear();

        let new_host = if self.host == user {
            let next = self.slots.iter().find_map(|s| s.user);
            if let Some(next) = next {
                self.host = next;
            }
            next
        } else {
            None
        };

        let finished = self.status == MatchStatus::Playing && self.all_playing(|s| s.completed);
        if finished {
            self.finish();
        }

        self.touch();
        tracing::debug!(match_id = %self.id, user_id = %user, slot = index, "player left match");
        Ok(LeaveOutcome {
            slot: index,
            new_host,
            empty: self.is_empty(),
            finished,
        })
    }

    fn host_missing(&self) -> bool {
        !self.contains(self.host)
    }

    // -- Host-gated operations --------------------------------------------

    /// Hands host to the occupant of `slot`. Returns the new host.
    pub fn transfer_host(&mut self, issuer: UserId, slot: usize) -> Result<UserId, MatchError> {
        self.require_host(issuer)?;
        self.require_slot_index(slot)?;
        let target = self.slots[slot]
            .user
            .ok_or(MatchError::SlotNotOccupied(slot))?;

        self.host = target;
        self.touch();
        tracing::info!(match_id = %self.id, from = %issuer, to = %target, "host transferred");
        Ok(target)
    }

    /// Sets or clears the password. `None` and `""` both clear it.
    pub fn change_password(
        &mut self,
        issuer: UserId,
        password: Option<String>,
    ) -> Result<(), MatchError> {
        self.require_host(issuer)?;

        self.password = normalize_password(password);
        self.touch();
        tracing::info!(
            match_id = %self.id,
            has_password = self.password.is_some(),
            "match password changed"
        );
        Ok(())
    }

    /// Moves the match to `Playing` and returns the users who will play:
    /// every occupant who has the beatmap.
    pub fn start(&mut self, issuer: UserId) -> Result<Vec<UserId>, MatchError> {
        self.require_host(issuer)?;
        self.require_status(MatchStatus::Idle, "already in progress")?;
        if !self.slots.iter().any(|s| s.is_occupied() && s.has_beatmap) {
            return Err(MatchError::InvalidState {
                match_id: self.id,
                status: self.status,
                reason: "nobody has the beatmap",
            });
        }

        let mut players = Vec::new();
        for slot in &mut self.slots {
            slot.reset_play_state();
            if let (Some(user), true) = (slot.user, slot.has_beatmap) {
                slot.playing = true;
                players.push(user);
            }
        }
        self.status = MatchStatus::Playing;
        self.touch();
        tracing::info!(match_id = %self.id, players = players.len(), "match started");
        Ok(players)
    }

    /// Stops a running match and returns the users who were playing.
    pub fn abort(&mut self, issuer: UserId) -> Result<Vec<UserId>, MatchError> {
        self.require_host(issuer)?;
        self.require_status(MatchStatus::Playing, "not in progress")?;

        let players = self
            .slots
            .iter()
            .filter(|s| s.playing)
            .filter_map(|s| s.user)
            .collect();
        self.finish();
        self.touch();
        tracing::info!(match_id = %self.id, "match aborted");
        Ok(players)
    }

    /// Replaces the settings. Changing the beatmap clears every ready flag;
    /// changing team mode reassigns teams; toggling free mods moves mods
    /// between the match and the slots.
    pub fn change_settings(
        &mut self,
        issuer: UserId,
        mut settings: MatchSettings,
        config: &MatchConfig,
    ) -> Result<(), MatchError> {
        self.require_host(issuer)?;
        self.require_status(MatchStatus::Idle, "settings are frozen while playing")?;

        settings.name = truncate_name(&settings.name, config.max_name_len);
        let beatmap_changed = settings.beatmap_id != self.settings.beatmap_id
            || settings.beatmap_checksum != self.settings.beatmap_checksum;
        let team_mode_changed = settings.team_mode != self.settings.team_mode;
        let free_mods_changed = settings.free_mods != self.settings.free_mods;

        if beatmap_changed {
            for slot in &mut self.slots {
                slot.ready = false;
            }
        }
        if team_mode_changed {
            let team = default_team(&settings);
            for slot in self.slots.iter_mut().filter(|s| s.is_occupied()) {
                slot.team = team;
            }
        }
        if free_mods_changed {
            self.redistribute_mods(settings.free_mods);
        }

        self.settings = settings;
        self.touch();
        Ok(())
    }

    fn redistribute_mods(&mut self, free_mods: bool) {
        if free_mods {
            let per_player = self.mods.without(Mods::SPEED_CHANGING);
            for slot in self.slots.iter_mut().filter(|s| s.is_occupied()) {
                slot.mods = per_player;
            }
            self.mods = self.mods & Mods::SPEED_CHANGING;
        } else {
            let host_mods = self
                .slot_of(self.host)
                .map(|i| self.slots[i].mods)
                .unwrap_or(Mods::NONE);
            self.mods |= host_mods;
            for slot in &mut self.slots {
                slot.mods = Mods::NONE;
            }
        }
    }

    /// Locks a free slot, unlocks a locked one, or kicks the occupant of a
    /// non-host slot and locks it. Returns the kicked user, if any.
    pub fn toggle_lock(
        &mut self,
        issuer: UserId,
        slot: usize,
    ) -> Result<Option<UserId>, MatchError> {
        self.require_host(issuer)?;
        self.require_slot_index(slot)?;
        if self.slots[slot].user == Some(self.host) {
            return Err(MatchError::SlotUnavailable(slot));
        }

        let kicked = self.slots[slot].user;
        let target = &mut self.slots[slot];
        match target.occupancy {
            Occupancy::Locked => target.occupancy = Occupancy::Free,
            Occupancy::Free | Occupancy::Occupied => {
                target.clear();
                target.occupancy = Occupancy::Locked;
            }
        }
        if let Some(user) = kicked {
            tracing::info!(
                match_id = %self.id,
                user_id = %user,
                slot,
                "player kicked by slot lock"
            );
        }
        self.touch();
        Ok(kicked)
    }

    // -- Player operations ------------------------------------------------

    /// Moves `user` to the free slot `target`. Returns the old index.
    pub fn move_to_slot(&mut self, user: UserId, target: usize) -> Result<usize, MatchError> {
        let from = self.require_slot_of(user)?;
        self.require_slot_index(target)?;
        if !self.slots[target].is_free() {
            return Err(MatchError::SlotUnavailable(target));
        }

        let mut moved = std::mem::take(&mut self.slots[from]);
        self.slots[from].clear();
        moved.ready = false;
        self.slots[target] = moved;
        self.touch();
        Ok(from)
    }

    pub fn set_ready(&mut self, user: UserId, ready: bool) -> Result<(), MatchError> {
        let index = self.require_slot_of(user)?;
        self.slots[index].ready = ready;
        self.touch();
        Ok(())
    }

    /// Marking the beatmap missing also clears readiness.
    pub fn set_has_beatmap(&mut self, user: UserId, has_beatmap: bool) -> Result<(), MatchError> {
        let index = self.require_slot_of(user)?;
        let slot = &mut self.slots[index];
        slot.has_beatmap = has_beatmap;
        if !has_beatmap {
            slot.ready = false;
        }
        self.touch();
        Ok(())
    }

    /// Switches `user` between red and blue. Only in team modes.
    pub fn change_team(&mut self, user: UserId) -> Result<Team, MatchError> {
        let index = self.require_slot_of(user)?;
        if !self.settings.team_mode.is_team_based() {
            return Err(MatchError::InvalidState {
                match_id: self.id,
                status: self.status,
                reason: "not a team mode",
            });
        }

        let slot = &mut self.slots[index];
        slot.team = match slot.team {
            Team::Red => Team::Blue,
            Team::Blue | Team::Neutral => Team::Red,
        };
        let team = slot.team;
        self.touch();
        Ok(team)
    }

    /// Changes mods.
    ///
    /// Without free mods only the host may change them, and they apply to
    /// the whole match. With free mods, everyone sets their own slot mods;
    /// speed-changing mods stay match-wide and only the host sets those.
    pub fn change_mods(&mut self, user: UserId, mods: Mods) -> Result<(), MatchError> {
        let index = self.require_slot_of(user)?;

        if self.settings.free_mods {
            if self.is_host(user) {
                self.mods = mods & Mods::SPEED_CHANGING;
            }
            self.slots[index].mods = mods.without(Mods::SPEED_CHANGING);
        } else {
            self.require_host(user)?;
            self.mods = mods;
        }
        self.touch();
        Ok(())
    }

    // -- In-play bookkeeping ----------------------------------------------

    /// Marks `user` as loaded. Returns `true` if this made every playing
    /// slot loaded.
    pub fn mark_loaded(&mut self, user: UserId) -> Result<bool, MatchError> {
        let index = self.require_playing_slot(user)?;
        let was_loaded = self.slots[index].loaded;
        self.slots[index].loaded = true;
        self.touch();
        Ok(!was_loaded && self.all_playing(|s| s.loaded))
    }

    pub fn mark_skipped(&mut self, user: UserId) -> Result<SkipOutcome, MatchError> {
        let index = self.require_playing_slot(user)?;
        let was_skipped = self.slots[index].skipped;
        self.slots[index].skipped = true;
        self.touch();
        Ok(SkipOutcome {
            slot: index,
            all_skipped: !was_skipped && self.all_playing(|s| s.skipped),
        })
    }

    /// Marks `user` as finished. Returns `true` if every playing slot has
    /// now completed, in which case the match is back to `Idle`.
    pub fn mark_completed(&mut self, user: UserId) -> Result<bool, MatchError> {
        let index = self.require_playing_slot(user)?;
        self.slots[index].completed = true;

        let finished = self.all_playing(|s| s.completed);
        if finished {
            self.finish();
            tracing::info!(match_id = %self.id, "match completed");
        }
        self.touch();
        Ok(finished)
    }

    /// Marks `user` as failed and returns their slot.
    pub fn mark_failed(&mut self, user: UserId) -> Result<usize, MatchError> {
        let index = self.require_playing_slot(user)?;
        self.slots[index].failed = true;
        self.touch();
        Ok(index)
    }

    /// `true` if every playing slot satisfies `pred` (vacuously true when
    /// nobody is playing).
    fn all_playing(&self, pred: impl Fn(&Slot) -> bool) -> bool {
        self.slots.iter().filter(|s| s.playing).all(pred)
    }

    fn finish(&mut self) {
        self.status = MatchStatus::Idle;
        for slot in &mut self.slots {
            slot.reset_play_state();
            slot.ready = false;
        }
    }
}

fn normalize_password(password: Option<String>) -> Option<String> {
    password.filter(|p| !p.is_empty())
}

fn truncate_name(name: &str, max_len: usize) -> String {
    name.chars().take(max_len).collect()
}

fn default_team(settings: &MatchSettings) -> Team {
    if settings.team_mode.is_team_based() {
        Team::Red
    } else {
        Team::Neutral
    }
}

// =========================================================================
// Tests
// =========================================================================
