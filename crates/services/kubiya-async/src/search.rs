//! Fuzzy tool matching.

/// Maximum number of matches returned by a tool search
pub const MAX_SEARCH_RESULTS: usize = 10;

/// Edit distance between `a` and `b`, counted in characters
#[must_use]
pub fn levenshtein(a: &str, b: &str) -> usize {
    let (long, short): (Vec<char>, Vec<char>) = if a.chars().count() >= b.chars().count() {
        (a.chars().collect(), b.chars().collect())
    } else {
        (b.chars().collect(), a.chars().collect())
    };
    if short.is_empty() {
        return long.len();
    }

    let mut previous: Vec<usize> = (0..=short.len()).collect();
    let mut current = Vec::with_capacity(short.len() + 1);
    for (i, c1) in long.iter().enumerate() {
        current.clear();
        current.push(i + 1);
        for (j, c2) in short.iter().enumerate() {
            let insertion = previous[j + 1] + 1;
            let deletion = current[j] + 1;
            let substitution = previous[j] + usize::from(c1 != c2);
            current.push(insertion.min(deletion).min(substitution));
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[short.len()]
}

/// Distance of a tool from a lowercase `query`
///
/// Substring hits in the name or description score 0. Otherwise the closer
/// of the two edit distances is used.
#[must_use]
pub fn match_distance(query: &str, name: &str, description: &str) -> usize {
    let name = name.to_lowercase();
    let description = description.to_lowercase();
    if name.contains(query) || description.contains(query) {
        return 0;
    }
    levenshtein(&name, query).min(levenshtein(&description, query))
}

/// Largest distance still counted as a match
#[must_use]
pub fn threshold(query: &str) -> usize {
    query.chars().count() / 2
}

/// Whether a source looks related to a lowercase `query`
///
/// True when the query occurs in the name or description, or either starts
/// with one of the query's words.
#[must_use]
pub fn source_is_relevant(query: &str, name: &str, description: &str) -> bool {
    let name = name.to_lowercase();
    let description = description.to_lowercase();
    name.contains(query)
        || description.contains(query)
        || query
            .split_whitespace()
            .any(|w| name.starts_with(w) || description.starts_with(w))
}

/// Sorts by `(distance, name)` and keeps the best [`MAX_SEARCH_RESULTS`]
pub fn rank<T>(matches: &mut Vec<T>, key: impl Fn(&T) -> (usize, &str)) {
    matches.sort_by(|a, b| key(a).cmp(&key(b)));
    matches.truncate(MAX_SEARCH_RESULTS);
}
