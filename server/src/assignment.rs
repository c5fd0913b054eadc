//! Combo generation and the guesser→author assignment for a round.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::Rng;
use shared::{EmojiCombo, PlayerId, COMBO_SIZE, GUESS_OPTION_COUNT};

use crate::catalog::CATALOG;

/// 3 distinct symbols drawn without replacement from the catalog, in random order.
pub fn random_combo(rng: &mut impl Rng) -> EmojiCombo {
    let mut picked: Vec<&'static str> = CATALOG
        .choose_multiple(rng, COMBO_SIZE)
        .map(|e| e.symbol)
        .collect();
    picked.shuffle(rng);
    EmojiCombo(std::array::from_fn(|i| picked[i].to_string()))
}

/// Fixed-point-free mapping over `ids` via Sattolo's algorithm: a single
/// random cycle, so for 2 or more ids nobody maps to themself. Fewer than 2
/// ids admit no derangement and yield an empty map.
pub fn guess_derangement(ids: &[PlayerId], rng: &mut impl Rng) -> HashMap<PlayerId, PlayerId> {
    if ids.len() < 2 {
        return HashMap::new();
    }
    let mut targets: Vec<PlayerId> = ids.to_vec();
    for i in (1..targets.len()).rev() {
        let j = rng.gen_range(0..i);
        targets.swap(i, j);
    }
    ids.iter().copied().zip(targets).collect()
}

/// Maps each guesser to the author whose story they will evaluate.
///
/// When everyone submitted (authors == guessers) this is a derangement. When
/// the writing deadline fired early, each guesser instead gets a uniformly
/// random author other than themself; a guesser with no eligible author (the
/// sole submitter) is left out of the map.
pub fn build_assignments(
    guessers: &[PlayerId],
    authors: &[PlayerId],
    rng: &mut impl Rng,
) -> HashMap<PlayerId, PlayerId> {
    if guessers.len() == authors.len() && authors.iter().all(|a| guessers.contains(a)) {
        return guess_derangement(guessers, rng);
    }

    let mut assignments = HashMap::new();
    for &guesser in guessers {
        let eligible: Vec<PlayerId> = authors.iter().copied().filter(|&a| a != guesser).collect();
        if let Some(&author) = eligible.choose(rng) {
            assignments.insert(guesser, author);
        }
    }
    assignments
}

/// 6 pairwise-distinct combos, one of them the correct one, shuffled.
pub fn guess_options(correct: &EmojiCombo, rng: &mut impl Rng) -> Vec<EmojiCombo> {
    let mut options = vec![correct.clone()];
    while options.len() < GUESS_OPTION_COUNT {
        let decoy = random_combo(rng);
        if !options.contains(&decoy) {
            options.push(decoy);
        }
    }
    options.shuffle(rng);
    options
}
