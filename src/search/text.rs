//! Full-text analysis: lexeme vectors, plain text queries and cover-density rank.
//!
//! Text is split into Unicode words, lowercased, stripped of English stopwords
//! and reduced with the English Snowball stemmer. Word positions start at 1 and
//! count stopwords, so the gap between two lexemes reflects the original text.
//!
//! A [`SearchVector`] is stored next to each formula in a compact textual form
//! (`'lexeme':1,4 'other':2`), which also lets the store prefilter candidates
//! with a plain `LIKE` before the exact match runs here.

use crate::errors::{Error, Result};
use rust_stemmers::{Algorithm, Stemmer};
use std::{
    collections::{BTreeMap, HashSet},
    fmt,
    str::FromStr,
    sync::LazyLock,
};
use unicode_segmentation::UnicodeSegmentation;

/// Weight of a single cover before the noise penalty.
const COVER_WEIGHT: f64 = 0.1;

static STOPWORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "your", "yours",
        "yourself", "yourselves", "he", "him", "his", "himself", "she", "her", "hers", "herself",
        "it", "its", "itself", "they", "them", "their", "theirs", "themselves", "what", "which",
        "who", "whom", "this", "that", "these", "those", "am", "is", "are", "was", "were", "be",
        "been", "being", "have", "has", "had", "having", "do", "does", "did", "doing", "a", "an",
        "the", "and", "but", "if", "or", "because", "as", "until", "while", "of", "at", "by",
        "for", "with", "about", "against", "between", "into", "through", "during", "before",
        "after", "above", "below", "to", "from", "up", "down", "in", "out", "on", "off", "over",
        "under", "again", "further", "then", "once", "here", "there", "when", "where", "why",
        "how", "all", "any", "both", "each", "few", "more", "most", "other", "some", "such", "no",
        "nor", "not", "only", "own", "same", "so", "than", "too", "very", "s", "t", "can", "will",
        "just", "don", "should", "now",
    ]
    .into_iter()
    .collect()
});

/// Splits `text` into `(lexeme, position)` pairs.
#[must_use]
pub fn analyze(text: &str) -> Vec<(String, u32)> {
    let stemmer = Stemmer::create(Algorithm::English);
    let mut lexemes = Vec::new();

    for (position, word) in (1..).zip(text.unicode_words()) {
        let word = word.to_lowercase();
        if STOPWORDS.contains(word.as_str()) {
            continue;
        }
        lexemes.push((stemmer.stem(&word).into_owned(), position));
    }

    lexemes
}

/// Lexemes of a document with the positions they occur at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchVector {
    lexemes: BTreeMap<String, Vec<u32>>,
}

impl SearchVector {
    /// Analyzes `text` into a vector.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        let mut lexemes: BTreeMap<String, Vec<u32>> = BTreeMap::new();
        for (lexeme, position) in analyze(text) {
            lexemes.entry(lexeme).or_default().push(position);
        }
        Self { lexemes }
    }

    /// Vector over a formula's name followed by its description.
    #[must_use]
    pub fn for_formula(name: &str, description: Option<&str>) -> Self {
        match description {
            Some(description) => Self::from_text(&format!("{name} {description}")),
            None => Self::from_text(name),
        }
    }

    /// Positions of `lexeme`, if it occurs.
    #[must_use]
    pub fn positions(&self, lexeme: &str) -> Option<&[u32]> {
        self.lexemes.get(lexeme).map(Vec::as_slice)
    }

    /// Whether the document produced no lexemes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lexemes.is_empty()
    }
}

impl fmt::Display for SearchVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, (lexeme, positions)) in self.lexemes.iter().enumerate() {
            if index > 0 {
                f.write_str(" ")?;
            }
            write!(f, "'{}':", lexeme.replace('\'', "''"))?;
            for (i, position) in positions.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                write!(f, "{position}")?;
            }
        }
        Ok(())
    }
}

impl FromStr for SearchVector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = || Error::DataFormat(format!("Malformed search vector: {s}"));
        let mut lexemes = BTreeMap::new();
        let mut chars = s.chars().peekable();

        loop {
            while chars.next_if(|c| c.is_whitespace()).is_some() {}
            match chars.next() {
                None => break,
                Some('\'') => {}
                Some(_) => return Err(malformed()),
            }

            let mut lexeme = String::new();
            loop {
                match chars.next() {
                    Some('\'') if chars.next_if_eq(&'\'').is_some() => lexeme.push('\''),
                    Some('\'') => break,
                    Some(c) => lexeme.push(c),
                    None => return Err(malformed()),
                }
            }

            if chars.next() != Some(':') {
                return Err(malformed());
            }
            let mut digits = String::new();
            while let Some(c) = chars.next_if(|c| c.is_ascii_digit() || *c == ',') {
                digits.push(c);
            }
            let positions = digits
                .split(',')
                .map(|p| p.parse::<u32>().map_err(|_| malformed()))
                .collect::<Result<Vec<_>>>()?;

            lexemes.insert(lexeme, positions);
        }

        Ok(Self { lexemes })
    }
}

/// A plain text query: every lexeme must occur in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextQuery {
    lexemes: Vec<String>,
}

impl TextQuery {
    /// Builds a query from free text. Stopwords are dropped and duplicates
    /// collapse, so the query may end up empty.
    #[must_use]
    pub fn plain(text: &str) -> Self {
        let mut lexemes: Vec<String> = analyze(text).into_iter().map(|(l, _)| l).collect();
        lexemes.sort_unstable();
        lexemes.dedup();
        Self { lexemes }
    }

    /// Query lexemes, sorted and unique.
    #[must_use]
    pub fn lexemes(&self) -> &[String] {
        &self.lexemes
    }

    /// An empty query matches nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lexemes.is_empty()
    }

    /// Whether every query lexeme occurs in `vector`.
    #[must_use]
    pub fn matches(&self, vector: &SearchVector) -> bool {
        !self.is_empty()
            && self
                .lexemes
                .iter()
                .all(|lexeme| vector.positions(lexeme).is_some())
    }

    /// Cover-density rank of `vector` against this query.
    ///
    /// Each minimal span containing every query lexeme scores
    /// `0.1 / (1 + noise)`, where noise counts the positions inside the span
    /// that are not query-lexeme occurrences. Documents without a full cover
    /// rank 0.
    #[must_use]
    pub fn rank(&self, vector: &SearchVector) -> f64 {
        if self.is_empty() {
            return 0.0;
        }

        let mut occurrences: Vec<(u32, usize)> = self
            .lexemes
            .iter()
            .enumerate()
            .flat_map(|(index, lexeme)| {
                vector
                    .positions(lexeme)
                    .unwrap_or_default()
                    .iter()
                    .map(move |&position| (position, index))
            })
            .collect();
        occurrences.sort_unstable();

        let mut rank = 0.0;
        let mut start = 0;
        while let Some((begin, end)) = next_cover(&occurrences, self.lexemes.len(), start) {
            let span = occurrences[end].0 - occurrences[begin].0;
            let inside = u32::try_from(end - begin).unwrap_or(u32::MAX);
            let noise = span.saturating_sub(inside);
            rank += COVER_WEIGHT / f64::from(noise + 1);
            start = begin + 1;
        }

        rank
    }
}

/// Finds the first minimal cover at or after `start`.
///
/// `occurrences` are `(position, lexeme_index)` sorted by position. The cover
/// ends at the earliest occurrence completing the lexeme set, then begins at
/// the latest occurrence that still keeps the set complete.
fn next_cover(occurrences: &[(u32, usize)], lexeme_count: usize, start: usize) -> Option<(usize, usize)> {
    let mut seen = vec![false; lexeme_count];
    let mut found = 0;
    let mut end = None;

    for (i, &(_, lexeme)) in occurrences.iter().enumerate().skip(start) {
        if !seen[lexeme] {
            seen[lexeme] = true;
            found += 1;
            if found == lexeme_count {
                end = Some(i);
                break;
            }
        }
    }
    let end = end?;

    seen.fill(false);
    found = 0;
    for begin in (start..=end).rev() {
        let lexeme = occurrences[begin].1;
        if !seen[lexeme] {
            seen[lexeme] = true;
            found += 1;
            if found == lexeme_count {
                return Some((begin, end));
            }
        }
    }

    None
}
