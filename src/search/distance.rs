//! Levenshtein edit distance over Unicode scalar values.

/// Minimum number of single-character insertions, deletions or substitutions
/// turning `a` into `b`. Case-sensitive; callers lowercase first.
#[must_use]
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

/// Case-insensitive check that `a` and `b` are at most `max` edits apart.
#[must_use]
pub fn within(a: &str, b: &str, max: usize) -> bool {
    levenshtein(&a.to_lowercase(), &b.to_lowercase()) <= max
}
