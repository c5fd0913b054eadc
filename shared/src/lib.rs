use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub const ROOM_CODE_LEN: usize = 6;
pub const MIN_PLAYERS: usize = 3;
pub const COMBO_SIZE: usize = 3;
pub const GUESS_OPTION_COUNT: usize = 6;
pub const WRITING_SECS: u64 = 180;
pub const REVEAL_STEPS: usize = 4;
pub const MAX_FRAME_BYTES: usize = 64 * 1024;

pub type PlayerId = u32;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PlayerInfo {
    pub id: PlayerId,
    pub name: String,
    pub avatar: String,
}

impl PlayerInfo {
    pub fn new(id: PlayerId, name: &str, avatar: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            avatar: avatar.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct EmojiCombo(pub [String; COMBO_SIZE]);

impl EmojiCombo {
    pub fn new(symbols: [&str; COMBO_SIZE]) -> Self {
        Self(symbols.map(|s| s.to_string()))
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl fmt::Display for EmojiCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(" "))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Guess {
    pub emoji_combo: EmojiCombo,
    pub claimed_author: PlayerId,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ScoreEntry {
    pub reason: String,
    pub delta: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct GuessRecord {
    pub guesser: PlayerId,
    pub guess: Guess,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StoryReveal {
    pub author: PlayerId,
    pub author_name: String,
    pub emojis: EmojiCombo,
    pub story: String,
    pub emoji_guessers: Vec<String>,
    pub author_guessers: Vec<String>,
    pub guesses: Vec<GuessRecord>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResultsCursor {
    pub chat_index: usize,
    pub message_step: usize,
}

impl ResultsCursor {
    /// One host click forward through the reveal feed: steps within a story,
    /// then on to the next story, clamping at the last step of the last one.
    pub fn advanced(self, chat_count: usize) -> ResultsCursor {
        if chat_count == 0 {
            return self;
        }
        if self.message_step + 1 < REVEAL_STEPS {
            ResultsCursor {
                chat_index: self.chat_index,
                message_step: self.message_step + 1,
            }
        } else if self.chat_index + 1 < chat_count {
            ResultsCursor {
                chat_index: self.chat_index + 1,
                message_step: 0,
            }
        } else {
            ResultsCursor {
                chat_index: self.chat_index,
                message_step: REVEAL_STEPS - 1,
            }
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum ClientPacket {
    CreateRoom {
        name: String,
        avatar: String,
    },
    JoinRoom {
        room_code: String,
        name: String,
        avatar: String,
    },
    StartGame {
        room_code: String,
    },
    SubmitText {
        room_code: String,
        text: String,
    },
    SubmitGuess {
        room_code: String,
        guess: Guess,
    },
    AdvanceResults {
        room_code: String,
    },
    RequestLeaderboard {
        room_code: String,
    },
    NewGame {
        room_code: String,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum ServerPacket {
    RoomCreated {
        room_code: String,
        players: Vec<PlayerInfo>,
    },
    RoomJoined {
        room_code: String,
        players: Vec<PlayerInfo>,
    },
    RoomError {
        message: String,
    },
    RosterUpdated {
        players: Vec<PlayerInfo>,
    },
    WritingPhase {
        emojis: EmojiCombo,
        deadline_epoch_ms: u64,
    },
    GuessingPhase {
        story: String,
        emoji_options: Vec<EmojiCombo>,
        candidate_authors: Vec<PlayerInfo>,
    },
    ResultsPhase {
        chat_feed: Vec<StoryReveal>,
        players: Vec<PlayerInfo>,
        leaderboard: HashMap<PlayerId, f32>,
        cursor: ResultsCursor,
    },
    ResultsProgress {
        cursor: ResultsCursor,
    },
    LeaderboardPhase {
        scores: HashMap<PlayerId, f32>,
        justifications: HashMap<PlayerId, Vec<ScoreEntry>>,
        players: Vec<PlayerInfo>,
    },
    NewGameReady {
        players: Vec<PlayerInfo>,
        leaderboard: HashMap<PlayerId, f32>,
    },
    RoomClosed,
}
