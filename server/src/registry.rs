//! Live rooms plus the connection→room membership index.
//!
//! The registry owns every [`Room`] and resolves inbound intents to the right
//! one. The membership index enforces that a connection sits in at most one
//! room: creating or joining while seated performs an implicit departure from
//! the old room first, with all the effects a real disconnect would have.

use std::collections::HashMap;
use std::time::Duration;

use log::{debug, info};
use rand::Rng;
use shared::{Guess, PlayerId, PlayerInfo, ServerPacket, ROOM_CODE_LEN};

use crate::room::{Departure, Effects, Phase, Room, RoomError, TimerEffect};

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub struct RoomRegistry {
    rooms: HashMap<String, Room>,
    members: HashMap<PlayerId, String>,
    writing_duration: Duration,
}

impl RoomRegistry {
    pub fn new(writing_duration: Duration) -> Self {
        Self {
            rooms: HashMap::new(),
            members: HashMap::new(),
            writing_duration,
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn room(&self, code: &str) -> Option<&Room> {
        self.rooms.get(code)
    }

    /// Which room a connection is currently seated in, if any.
    pub fn room_of(&self, id: PlayerId) -> Option<&str> {
        self.members.get(&id).map(String::as_str)
    }

    /// Creates a room with a fresh unique code and seats the host in it.
    pub fn create_room(&mut self, host: PlayerInfo) -> (String, Effects) {
        let mut effects = self.implicit_leave(host.id);

        let code = self.unique_code(&mut rand::thread_rng());
        let host_id = host.id;
        let room = Room::new(code.clone(), host, self.writing_duration);
        effects.send(
            host_id,
            ServerPacket::RoomCreated {
                room_code: code.clone(),
                players: room.players().to_vec(),
            },
        );
        effects.broadcast(
            room.players(),
            ServerPacket::RosterUpdated {
                players: room.players().to_vec(),
            },
        );
        self.rooms.insert(code.clone(), room);
        self.members.insert(host_id, code.clone());
        (code, effects)
    }

    pub fn join_room(&mut self, code: &str, player: PlayerInfo) -> Result<Effects, RoomError> {
        let joinable = match self.rooms.get(code) {
            None => return Err(RoomError::InvalidRoom),
            Some(room) => room.phase() == Phase::Lobby,
        };

        if self.room_of(player.id) == Some(code) {
            // Redundant join of the room they are already in; re-acknowledge
            // without touching the roster.
            let room = &self.rooms[code];
            let mut effects = Effects::default();
            effects.send(
                player.id,
                ServerPacket::RoomJoined {
                    room_code: code.to_string(),
                    players: room.players().to_vec(),
                },
            );
            return Ok(effects);
        }
        if !joinable {
            return Err(RoomError::AlreadyStarted);
        }

        let mut effects = self.implicit_leave(player.id);
        let id = player.id;
        let room = self.rooms.get_mut(code).ok_or(RoomError::InvalidRoom)?;
        effects.merge(room.join(player)?);
        self.members.insert(id, code.to_string());
        Ok(effects)
    }

    pub fn start_game(
        &mut self,
        code: &str,
        sender: PlayerId,
        now_ms: u64,
    ) -> Result<Effects, RoomError> {
        self.room_for(code, sender)?.start_game(sender, now_ms)
    }

    pub fn submit_story(
        &mut self,
        code: &str,
        sender: PlayerId,
        text: String,
    ) -> Result<Effects, RoomError> {
        self.room_for(code, sender)?.submit_story(sender, text)
    }

    pub fn submit_guess(
        &mut self,
        code: &str,
        sender: PlayerId,
        guess: Guess,
    ) -> Result<Effects, RoomError> {
        self.room_for(code, sender)?.submit_guess(sender, guess)
    }

    pub fn advance_results(&mut self, code: &str, sender: PlayerId) -> Result<Effects, RoomError> {
        self.room_for(code, sender)?.advance_results(sender)
    }

    pub fn request_leaderboard(
        &mut self,
        code: &str,
        sender: PlayerId,
    ) -> Result<Effects, RoomError> {
        self.room_for(code, sender)?.request_leaderboard(sender)
    }

    pub fn new_game(&mut self, code: &str, sender: PlayerId) -> Result<Effects, RoomError> {
        self.room_for(code, sender)?.new_game(sender)
    }

    /// Deadline timer callback; the room may be gone by the time it fires.
    pub fn writing_deadline(&mut self, code: &str, round: u32) -> Effects {
        match self.rooms.get_mut(code) {
            Some(room) => room.writing_deadline_elapsed(round),
            None => Effects::default(),
        }
    }

    /// Handles a connection going away, idempotently. Destroys the room when
    /// the host leaves or the last seat empties.
    pub fn remove_connection(&mut self, id: PlayerId) -> Effects {
        let Some(code) = self.members.remove(&id) else {
            return Effects::default();
        };
        let Some(room) = self.rooms.get_mut(&code) else {
            return Effects::default();
        };
        match room.remove_participant(id) {
            Departure::NotMember => Effects::default(),
            Departure::Remaining { effects } => effects,
            Departure::Closed { notify } => {
                self.rooms.remove(&code);
                for pid in &notify {
                    self.members.remove(pid);
                }
                info!("Room {} destroyed, {} rooms remain", code, self.rooms.len());

                let mut effects = Effects::default();
                for pid in notify {
                    effects.send(pid, ServerPacket::RoomClosed);
                }
                effects.timer = TimerEffect::Cancel { room_code: code };
                effects
            }
        }
    }

    fn room_for(&mut self, code: &str, sender: PlayerId) -> Result<&mut Room, RoomError> {
        let room = self.rooms.get_mut(code).ok_or(RoomError::InvalidRoom)?;
        if !room.contains(sender) {
            return Err(RoomError::NoSuchParticipant);
        }
        Ok(room)
    }

    fn implicit_leave(&mut self, id: PlayerId) -> Effects {
        if self.members.contains_key(&id) {
            debug!("Connection {} switches rooms, leaving the old one first", id);
            self.remove_connection(id)
        } else {
            Effects::default()
        }
    }

    fn unique_code(&self, rng: &mut impl Rng) -> String {
        loop {
            let code: String = (0..ROOM_CODE_LEN)
                .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
                .collect();
            if !self.rooms.contains_key(&code) {
                return code;
            }
            debug!("Room code collision on {}, retrying", code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WRITING: Duration = Duration::from_secs(180);

    fn player(id: PlayerId) -> PlayerInfo {
        PlayerInfo::new(id, &format!("p{id}"), "🙂")
    }

    fn registry_with_room(n: u32) -> (RoomRegistry, String) {
        let mut registry = RoomRegistry::new(WRITING);
        let (code, _) = registry.create_room(player(1));
        for id in 2..=n {
            registry.join_room(&code, player(id)).unwrap();
        }
        (registry, code)
    }

    #[test]
    fn test_create_room_registers_host() {
        let mut registry = RoomRegistry::new(WRITING);
        let (code, effects) = registry.create_room(player(1));

        assert_eq!(code.len(), ROOM_CODE_LEN);
        assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
        assert_eq!(registry.room_count(), 1);
        assert_eq!(registry.room_of(1), Some(code.as_str()));
        assert!(registry.room(&code).unwrap().contains(1));

        let kinds: Vec<&ServerPacket> = effects.outbound.iter().map(|o| &o.event).collect();
        assert!(matches!(kinds[0], ServerPacket::RoomCreated { room_code, .. } if *room_code == code));
        assert!(matches!(kinds[1], ServerPacket::RosterUpdated { players } if players.len() == 1));
    }

    #[test]
    fn test_room_codes_are_unique() {
        let mut registry = RoomRegistry::new(WRITING);
        let mut codes = std::collections::HashSet::new();
        for id in 1..=200 {
            let (code, _) = registry.create_room(player(id));
            assert!(codes.insert(code), "duplicate room code");
        }
        assert_eq!(registry.room_count(), 200);
    }

    #[test]
    fn test_join_unknown_room() {
        let mut registry = RoomRegistry::new(WRITING);
        let err = registry.join_room("NOPE00", player(1)).unwrap_err();
        assert_eq!(err, RoomError::InvalidRoom);
    }

    #[test]
    fn test_join_after_start_rejected() {
        let (mut registry, code) = registry_with_room(3);
        registry.start_game(&code, 1, 0).unwrap();
        let err = registry.join_room(&code, player(9)).unwrap_err();
        assert_eq!(err, RoomError::AlreadyStarted);
        assert_eq!(registry.room_of(9), None);
    }

    #[test]
    fn test_ops_require_membership() {
        let (mut registry, code) = registry_with_room(3);
        assert_eq!(
            registry.start_game(&code, 99, 0).unwrap_err(),
            RoomError::NoSuchParticipant
        );
        assert_eq!(
            registry
                .submit_story(&code, 99, "intruder".to_string())
                .unwrap_err(),
            RoomError::NoSuchParticipant
        );
    }

    #[test]
    fn test_unknown_code_for_ops() {
        let mut registry = RoomRegistry::new(WRITING);
        assert_eq!(
            registry.start_game("ZZZZZZ", 1, 0).unwrap_err(),
            RoomError::InvalidRoom
        );
    }

    #[test]
    fn test_host_disconnect_closes_room() {
        let (mut registry, code) = registry_with_room(3);
        let effects = registry.remove_connection(1);

        assert_eq!(registry.room_count(), 0);
        for id in 1..=3 {
            assert_eq!(registry.room_of(id), None);
        }
        let closed: Vec<PlayerId> = effects
            .outbound
            .iter()
            .filter(|o| matches!(o.event, ServerPacket::RoomClosed))
            .map(|o| o.to)
            .collect();
        assert_eq!(closed, vec![2, 3]);
        assert_eq!(effects.timer, TimerEffect::Cancel { room_code: code });
    }

    #[test]
    fn test_nonhost_disconnect_updates_roster() {
        let (mut registry, code) = registry_with_room(3);
        let effects = registry.remove_connection(3);

        assert_eq!(registry.room_count(), 1);
        assert_eq!(registry.room(&code).unwrap().players().len(), 2);
        assert_eq!(registry.room_of(3), None);
        assert!(effects
            .outbound
            .iter()
            .all(|o| matches!(o.event, ServerPacket::RosterUpdated { .. })));
    }

    #[test]
    fn test_remove_unknown_connection_is_noop() {
        let mut registry = RoomRegistry::new(WRITING);
        let effects = registry.remove_connection(42);
        assert!(effects.outbound.is_empty());
        assert_eq!(effects.timer, TimerEffect::Keep);
    }

    #[test]
    fn test_switching_rooms_leaves_the_old_one() {
        let (mut registry, old_code) = registry_with_room(3);
        let (new_code, effects) = registry.create_room(player(3));

        assert_ne!(old_code, new_code);
        assert_eq!(registry.room_of(3), Some(new_code.as_str()));
        assert_eq!(registry.room(&old_code).unwrap().players().len(), 2);
        // Old roommates heard the departure before the new room came up.
        assert!(effects
            .outbound
            .iter()
            .any(|o| o.to == 1 && matches!(o.event, ServerPacket::RosterUpdated { .. })));
    }

    #[test]
    fn test_rejoining_same_room_is_reacked() {
        let (mut registry, code) = registry_with_room(3);
        let effects = registry.join_room(&code, player(2)).unwrap();

        assert_eq!(registry.room(&code).unwrap().players().len(), 3);
        assert_eq!(effects.outbound.len(), 1);
        assert!(matches!(
            &effects.outbound[0].event,
            ServerPacket::RoomJoined { players, .. } if players.len() == 3
        ));
    }

    #[test]
    fn test_writing_deadline_routes_to_room() {
        let (mut registry, code) = registry_with_room(3);
        registry.start_game(&code, 1, 0).unwrap();
        registry
            .submit_story(&code, 1, "only one".to_string())
            .unwrap();

        registry.writing_deadline(&code, 1);
        assert_eq!(registry.room(&code).unwrap().phase(), Phase::Guessing);
    }

    #[test]
    fn test_deadline_for_missing_room_is_noop() {
        let mut registry = RoomRegistry::new(WRITING);
        let effects = registry.writing_deadline("GONE00", 1);
        assert!(effects.outbound.is_empty());
    }
}
