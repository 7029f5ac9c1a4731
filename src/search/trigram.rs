//! Trigram similarity.
//!
//! Text is lowercased and split into alphanumeric words. Each word is padded
//! with two leading spaces and one trailing space before taking every
//! three-character window, so short words and word starts weigh more.

use std::collections::HashSet;

type Trigram = [char; 3];

/// Set of padded trigrams in `text`.
#[must_use]
pub fn trigrams(text: &str) -> HashSet<Trigram> {
    let lowered = text.to_lowercase();
    let mut set = HashSet::new();

    for word in lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
    {
        let padded: Vec<char> = [' ', ' ']
            .into_iter()
            .chain(word.chars())
            .chain([' '])
            .collect();
        set.extend(padded.windows(3).map(|w| [w[0], w[1], w[2]]));
    }

    set
}

/// Shared trigrams over all distinct trigrams, in `[0, 1]`.
///
/// Returns 0 when either side has no trigrams.
#[must_use]
pub fn similarity(a: &str, b: &str) -> f64 {
    let left = trigrams(a);
    let right = trigrams(b);
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }

    let shared = left.intersection(&right).count();
    let union = left.len() + right.len() - shared;
    // trigram counts stay far below 2^52
    #[allow(clippy::cast_precision_loss)]
    let ratio = shared as f64 / union as f64;
    ratio
}
