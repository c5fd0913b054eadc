//! One room's lifecycle: phase transitions, submission bookkeeping, and the
//! outbound events each mutation produces.
//!
//! Room methods never touch sockets or timers directly. They return
//! [`Effects`] describing who should hear what and whether the writing
//! deadline timer must be armed or cancelled; the network layer carries those
//! out. That keeps every rule in this file testable without a runtime.

use std::collections::HashMap;
use std::time::Duration;

use log::{debug, info};
use shared::{
    EmojiCombo, Guess, PlayerId, PlayerInfo, ResultsCursor, ScoreEntry, ServerPacket, StoryReveal,
    MIN_PLAYERS,
};
use thiserror::Error;

use crate::{assignment, catalog, scoring};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoomError {
    #[error("Invalid room code.")]
    InvalidRoom,
    #[error("The game has already started.")]
    AlreadyStarted,
    #[error("Only the host can do that.")]
    NotHost,
    #[error("At least 3 players required to start the game.")]
    TooFewParticipants,
    #[error("That is not possible in the current phase.")]
    WrongPhase,
    #[error("unknown participant")]
    NoSuchParticipant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Lobby,
    Writing,
    Guessing,
    Results,
    Leaderboard,
}

#[derive(Debug)]
pub struct Outbound {
    pub to: PlayerId,
    pub event: ServerPacket,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub enum TimerEffect {
    #[default]
    Keep,
    Arm {
        room_code: String,
        round: u32,
        deadline_epoch_ms: u64,
    },
    Cancel {
        room_code: String,
    },
}

/// What a room operation wants the outside world to do.
#[derive(Debug, Default)]
pub struct Effects {
    pub outbound: Vec<Outbound>,
    pub timer: TimerEffect,
}

impl Effects {
    pub fn send(&mut self, to: PlayerId, event: ServerPacket) {
        self.outbound.push(Outbound { to, event });
    }

    pub fn broadcast(&mut self, players: &[PlayerInfo], event: ServerPacket) {
        for p in players {
            self.outbound.push(Outbound {
                to: p.id,
                event: event.clone(),
            });
        }
    }

    pub fn merge(&mut self, other: Effects) {
        self.outbound.extend(other.outbound);
        if other.timer != TimerEffect::Keep {
            self.timer = other.timer;
        }
    }
}

/// Outcome of removing a participant.
#[derive(Debug)]
pub enum Departure {
    /// The id was not a member; nothing changed.
    NotMember,
    /// The room must be destroyed; `notify` lists who should hear it closed.
    Closed { notify: Vec<PlayerId> },
    /// The room lives on with the given effects.
    Remaining { effects: Effects },
}

pub struct Room {
    code: String,
    phase: Phase,
    players: Vec<PlayerInfo>,
    writing_duration: Duration,
    writing_deadline_ms: u64,
    // Bumped on every game start; deadline timers carry it so a timer armed
    // for an earlier round can never fire into a later one.
    round: u32,
    combos: HashMap<PlayerId, EmojiCombo>,
    stories: HashMap<PlayerId, String>,
    assignments: HashMap<PlayerId, PlayerId>,
    guesses: HashMap<PlayerId, Guess>,
    scores: HashMap<PlayerId, f32>,
    score_log: HashMap<PlayerId, Vec<ScoreEntry>>,
    chat_feed: Vec<StoryReveal>,
    cursor: ResultsCursor,
}

impl Room {
    pub fn new(code: String, host: PlayerInfo, writing_duration: Duration) -> Self {
        info!("Room {}: created by {} ({})", code, host.name, host.id);
        Self {
            code,
            phase: Phase::Lobby,
            players: vec![host],
            writing_duration,
            writing_deadline_ms: 0,
            round: 0,
            combos: HashMap::new(),
            stories: HashMap::new(),
            assignments: HashMap::new(),
            guesses: HashMap::new(),
            scores: HashMap::new(),
            score_log: HashMap::new(),
            chat_feed: Vec::new(),
            cursor: ResultsCursor::default(),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn players(&self) -> &[PlayerInfo] {
        &self.players
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.players.iter().any(|p| p.id == id)
    }

    pub fn host_id(&self) -> Option<PlayerId> {
        self.players.first().map(|p| p.id)
    }

    fn is_host(&self, id: PlayerId) -> bool {
        self.host_id() == Some(id)
    }

    pub fn combo_of(&self, id: PlayerId) -> Option<&EmojiCombo> {
        self.combos.get(&id)
    }

    pub fn assigned_author(&self, id: PlayerId) -> Option<PlayerId> {
        self.assignments.get(&id).copied()
    }

    pub fn score_of(&self, id: PlayerId) -> f32 {
        self.scores.get(&id).copied().unwrap_or(0.0)
    }

    pub fn score_log_of(&self, id: PlayerId) -> &[ScoreEntry] {
        self.score_log.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn chat_feed(&self) -> &[StoryReveal] {
        &self.chat_feed
    }

    pub fn cursor(&self) -> ResultsCursor {
        self.cursor
    }

    pub fn writing_deadline_ms(&self) -> u64 {
        self.writing_deadline_ms
    }

    pub fn join(&mut self, player: PlayerInfo) -> Result<Effects, RoomError> {
        if self.phase != Phase::Lobby {
            return Err(RoomError::AlreadyStarted);
        }
        info!(
            "Room {}: {} ({}) joined, {} players now",
            self.code,
            player.name,
            player.id,
            self.players.len() + 1
        );
        let joiner = player.id;
        self.players.push(player);

        let mut effects = Effects::default();
        effects.send(
            joiner,
            ServerPacket::RoomJoined {
                room_code: self.code.clone(),
                players: self.players.clone(),
            },
        );
        effects.broadcast(
            &self.players,
            ServerPacket::RosterUpdated {
                players: self.players.clone(),
            },
        );
        Ok(effects)
    }

    pub fn start_game(&mut self, requester: PlayerId, now_ms: u64) -> Result<Effects, RoomError> {
        if !self.is_host(requester) {
            return Err(RoomError::NotHost);
        }
        if self.phase != Phase::Lobby {
            return Err(RoomError::AlreadyStarted);
        }
        if self.players.len() < MIN_PLAYERS {
            return Err(RoomError::TooFewParticipants);
        }

        self.clear_round_state();
        self.round += 1;
        self.phase = Phase::Writing;
        self.writing_deadline_ms = now_ms + self.writing_duration.as_millis() as u64;

        let mut rng = rand::thread_rng();
        self.combos = self
            .players
            .iter()
            .map(|p| (p.id, assignment::random_combo(&mut rng)))
            .collect();

        info!(
            "Room {}: round {} writing, {} players, {}s on the clock",
            self.code,
            self.round,
            self.players.len(),
            self.writing_duration.as_secs()
        );

        let mut effects = Effects::default();
        for p in &self.players {
            if let Some(combo) = self.combos.get(&p.id) {
                debug!(
                    "Room {}: {} writes about {} ({})",
                    self.code,
                    p.name,
                    combo,
                    catalog::describe(combo)
                );
                effects.send(
                    p.id,
                    ServerPacket::WritingPhase {
                        emojis: combo.clone(),
                        deadline_epoch_ms: self.writing_deadline_ms,
                    },
                );
            }
        }
        effects.timer = TimerEffect::Arm {
            room_code: self.code.clone(),
            round: self.round,
            deadline_epoch_ms: self.writing_deadline_ms,
        };
        Ok(effects)
    }

    pub fn submit_story(&mut self, from: PlayerId, story: String) -> Result<Effects, RoomError> {
        match self.phase {
            Phase::Lobby => Err(RoomError::WrongPhase),
            Phase::Writing => {
                debug!(
                    "Room {}: story from {} ({} chars)",
                    self.code,
                    from,
                    story.chars().count()
                );
                // Resubmitting overwrites; the last story before the phase
                // closes is the one that counts.
                self.stories.insert(from, story);
                if self.all_stories_in() {
                    Ok(self.close_writing())
                } else {
                    Ok(Effects::default())
                }
            }
            // The round has moved on; a late story changes nothing.
            _ => Ok(Effects::default()),
        }
    }

    pub fn submit_guess(&mut self, from: PlayerId, guess: Guess) -> Result<Effects, RoomError> {
        match self.phase {
            Phase::Lobby | Phase::Writing => Err(RoomError::WrongPhase),
            Phase::Guessing => {
                if !self.assignments.contains_key(&from) {
                    // Nothing was assigned to them this round.
                    return Ok(Effects::default());
                }
                debug!("Room {}: guess from {}", self.code, from);
                self.guesses.insert(from, guess);
                if self.guessing_complete() {
                    Ok(self.finish_guessing())
                } else {
                    Ok(Effects::default())
                }
            }
            _ => Ok(Effects::default()),
        }
    }

    /// Deadline timer callback. A stale timer (phase already advanced, or a
    /// round that is no longer current) is ignored.
    pub fn writing_deadline_elapsed(&mut self, round: u32) -> Effects {
        if self.phase != Phase::Writing || self.round != round {
            debug!(
                "Room {}: ignoring stale writing deadline for round {}",
                self.code, round
            );
            return Effects::default();
        }
        info!(
            "Room {}: writing deadline hit with {}/{} stories",
            self.code,
            self.stories.len(),
            self.players.len()
        );
        self.close_writing()
    }

    pub fn advance_results(&mut self, requester: PlayerId) -> Result<Effects, RoomError> {
        if !self.is_host(requester) {
            return Err(RoomError::NotHost);
        }
        if self.phase != Phase::Results {
            return Err(RoomError::WrongPhase);
        }
        self.cursor = self.cursor.advanced(self.chat_feed.len());
        let mut effects = Effects::default();
        effects.broadcast(
            &self.players,
            ServerPacket::ResultsProgress {
                cursor: self.cursor,
            },
        );
        Ok(effects)
    }

    pub fn request_leaderboard(&mut self, requester: PlayerId) -> Result<Effects, RoomError> {
        if !self.is_host(requester) {
            return Err(RoomError::NotHost);
        }
        if self.phase != Phase::Results && self.phase != Phase::Leaderboard {
            return Err(RoomError::WrongPhase);
        }
        self.phase = Phase::Leaderboard;
        let mut effects = Effects::default();
        effects.broadcast(
            &self.players,
            ServerPacket::LeaderboardPhase {
                scores: self.scores.clone(),
                justifications: self.score_log.clone(),
                players: self.players.clone(),
            },
        );
        Ok(effects)
    }

    /// Host-only reset back to Lobby after a finished game. The roster,
    /// cumulative scores and justification log survive; round state does not.
    pub fn new_game(&mut self, requester: PlayerId) -> Result<Effects, RoomError> {
        if !self.is_host(requester) {
            return Err(RoomError::NotHost);
        }
        if self.phase != Phase::Leaderboard {
            return Err(RoomError::WrongPhase);
        }
        self.phase = Phase::Lobby;
        self.clear_round_state();
        info!("Room {}: back to lobby for a new game", self.code);

        let mut effects = Effects::default();
        effects.broadcast(
            &self.players,
            ServerPacket::NewGameReady {
                players: self.players.clone(),
                leaderboard: self.scores.clone(),
            },
        );
        Ok(effects)
    }

    /// Idempotent removal. A departure can be the event that completes the
    /// current phase, so the same checks run as after a submission.
    pub fn remove_participant(&mut self, id: PlayerId) -> Departure {
        if !self.contains(id) {
            return Departure::NotMember;
        }
        let was_host = self.is_host(id);
        self.players.retain(|p| p.id != id);
        self.combos.remove(&id);
        self.stories.remove(&id);
        self.assignments.remove(&id);
        self.guesses.remove(&id);

        if was_host || self.players.is_empty() {
            info!(
                "Room {}: closing ({})",
                self.code,
                if was_host { "host left" } else { "empty" }
            );
            return Departure::Closed {
                notify: self.players.iter().map(|p| p.id).collect(),
            };
        }

        info!(
            "Room {}: {} left, {} players remain",
            self.code,
            id,
            self.players.len()
        );
        let mut effects = Effects::default();
        effects.broadcast(
            &self.players,
            ServerPacket::RosterUpdated {
                players: self.players.clone(),
            },
        );

        match self.phase {
            Phase::Writing if self.all_stories_in() => {
                let follow = self.close_writing();
                effects.merge(follow);
            }
            Phase::Guessing if self.guessing_complete() => {
                let follow = self.finish_guessing();
                effects.merge(follow);
            }
            _ => {}
        }
        Departure::Remaining { effects }
    }

    fn all_stories_in(&self) -> bool {
        self.players.iter().all(|p| self.stories.contains_key(&p.id))
    }

    fn guessing_complete(&self) -> bool {
        self.assignments
            .keys()
            .all(|id| self.guesses.contains_key(id))
    }

    fn close_writing(&mut self) -> Effects {
        self.phase = Phase::Guessing;

        let mut rng = rand::thread_rng();
        let guessers: Vec<PlayerId> = self.players.iter().map(|p| p.id).collect();
        let authors: Vec<PlayerId> = guessers
            .iter()
            .copied()
            .filter(|id| self.stories.contains_key(id))
            .collect();
        self.assignments = assignment::build_assignments(&guessers, &authors, &mut rng);

        info!(
            "Room {}: guessing, {} stories across {} players",
            self.code,
            authors.len(),
            guessers.len()
        );

        let mut effects = Effects::default();
        effects.timer = TimerEffect::Cancel {
            room_code: self.code.clone(),
        };

        for p in &self.players {
            let Some(&author) = self.assignments.get(&p.id) else {
                continue;
            };
            let (Some(story), Some(combo)) = (self.stories.get(&author), self.combos.get(&author))
            else {
                continue;
            };
            effects.send(
                p.id,
                ServerPacket::GuessingPhase {
                    story: story.clone(),
                    emoji_options: assignment::guess_options(combo, &mut rng),
                    candidate_authors: self
                        .players
                        .iter()
                        .filter(|q| q.id != p.id)
                        .cloned()
                        .collect(),
                },
            );
        }

        if self.guessing_complete() {
            // No assignments were possible; the round resolves on the spot.
            let follow = self.finish_guessing();
            effects.merge(follow);
        }
        effects
    }

    fn finish_guessing(&mut self) -> Effects {
        self.phase = Phase::Results;
        let scoring = scoring::score_round(
            &self.players,
            &self.combos,
            &self.stories,
            &self.assignments,
            &self.guesses,
        );
        for (&id, &delta) in &scoring.deltas {
            *self.scores.entry(id).or_insert(0.0) += delta;
        }
        for (id, entries) in scoring.justifications {
            self.score_log.entry(id).or_default().extend(entries);
        }
        self.chat_feed = scoring.chat_feed;
        self.cursor = ResultsCursor::default();

        info!(
            "Room {}: results ready, {} stories in the feed",
            self.code,
            self.chat_feed.len()
        );

        let mut effects = Effects::default();
        effects.broadcast(
            &self.players,
            ServerPacket::ResultsPhase {
                chat_feed: self.chat_feed.clone(),
                players: self.players.clone(),
                leaderboard: self.scores.clone(),
                cursor: self.cursor,
            },
        );
        effects
    }

    fn clear_round_state(&mut self) {
        self.combos.clear();
        self.stories.clear();
        self.assignments.clear();
        self.guesses.clear();
        self.chat_feed.clear();
        self.cursor = ResultsCursor::default();
        self.writing_deadline_ms = 0;
    }
}
