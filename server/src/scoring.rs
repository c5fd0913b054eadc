//! Point awards and the chat-style reveal feed for a completed round.

use std::collections::HashMap;

use shared::{EmojiCombo, Guess, GuessRecord, PlayerId, PlayerInfo, ScoreEntry, StoryReveal};

#[derive(Debug, Default)]
pub struct RoundScoring {
    pub chat_feed: Vec<StoryReveal>,
    pub deltas: HashMap<PlayerId, f32>,
    pub justifications: HashMap<PlayerId, Vec<ScoreEntry>>,
}

impl RoundScoring {
    fn award(&mut self, player: PlayerId, reason: String, delta: f32) {
        *self.deltas.entry(player).or_insert(0.0) += delta;
        self.justifications
            .entry(player)
            .or_default()
            .push(ScoreEntry { reason, delta });
    }
}

/// Scores one round. Authors are the players that still hold both a story and
/// a combo; everyone with a guess is evaluated as a guesser against the author
/// they were assigned. Runs on plain maps so the result depends only on the
/// final submission set, not on arrival order.
pub fn score_round(
    players: &[PlayerInfo],
    combos: &HashMap<PlayerId, EmojiCombo>,
    stories: &HashMap<PlayerId, String>,
    assignments: &HashMap<PlayerId, PlayerId>,
    guesses: &HashMap<PlayerId, Guess>,
) -> RoundScoring {
    let mut scoring = RoundScoring::default();

    let name_of = |id: PlayerId| -> String {
        players
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| "unknown".to_string())
    };

    // Every submitted guess, in roster order. The feed repeats the full list
    // per story so the client can render each reveal without cross-referencing.
    let submitted: Vec<GuessRecord> = players
        .iter()
        .filter_map(|p| {
            guesses.get(&p.id).map(|g| GuessRecord {
                guesser: p.id,
                guess: g.clone(),
            })
        })
        .collect();

    for author in players {
        let Some(story) = stories.get(&author.id) else {
            continue;
        };
        let Some(true_combo) = combos.get(&author.id) else {
            continue;
        };

        let emoji_guessers: Vec<PlayerId> = submitted
            .iter()
            .filter(|r| r.guess.emoji_combo == *true_combo)
            .map(|r| r.guesser)
            .collect();
        let author_guessers: Vec<PlayerId> = submitted
            .iter()
            .filter(|r| r.guess.emoji_combo == *true_combo && r.guess.claimed_author == author.id)
            .map(|r| r.guesser)
            .collect();

        scoring.chat_feed.push(StoryReveal {
            author: author.id,
            author_name: author.name.clone(),
            emojis: true_combo.clone(),
            story: story.clone(),
            emoji_guessers: emoji_guessers.iter().map(|&id| name_of(id)).collect(),
            author_guessers: author_guessers.iter().map(|&id| name_of(id)).collect(),
            guesses: submitted.clone(),
        });

        if emoji_guessers.is_empty() {
            scoring.award(author.id, "Nobody guessed your emoji (+1)".to_string(), 1.0);
        } else {
            let pts = emoji_guessers.len() * 2;
            scoring.award(
                author.id,
                format!("Your emoji was guessed by {} (+{})", emoji_guessers.len(), pts),
                pts as f32,
            );
        }
        if author_guessers.is_empty() {
            scoring.award(
                author.id,
                "Nobody guessed you as author (+1)".to_string(),
                1.0,
            );
        } else {
            let pts = author_guessers.len() * 2;
            scoring.award(
                author.id,
                format!(
                    "You were guessed as author by {} (+{})",
                    author_guessers.len(),
                    pts
                ),
                pts as f32,
            );
        }
    }

    for player in players {
        let Some(guess) = guesses.get(&player.id) else {
            continue;
        };
        let Some(&assigned) = assignments.get(&player.id) else {
            continue;
        };
        // The assigned author may have disconnected; their story is gone and
        // the guess simply earns nothing.
        if !players.iter().any(|p| p.id == assigned) {
            continue;
        }
        let Some(true_combo) = combos.get(&assigned) else {
            continue;
        };
        if guess.emoji_combo == *true_combo {
            scoring.award(
                player.id,
                "You guessed someone's emoji (+0.5)".to_string(),
                0.5,
            );
            if guess.claimed_author == assigned {
                scoring.award(player.id, "You guessed the author (+0.5)".to_string(), 0.5);
            }
        }
    }

    scoring
}
