use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use unaccent::unaccent;

// Anything that is not a letter, a digit or whitespace.
static PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}\s]").expect("valid punctuation regex"));

/// Normalize free text into a de-duplicated list of lower-case word tokens.
///
/// Each part is unaccented, lower-cased, stripped of punctuation and split on
/// whitespace. Tokens keep their first-seen order and empty tokens are dropped.
/// Nested inputs are flattened by the caller, e.g.
/// `strip_text(title.split(' ').chain(artists.iter().map(String::as_str)))`.
pub fn strip_text<I>(parts: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut tokens = Vec::new();
    for part in parts {
        let cleaned = unaccent(part.as_ref()).to_lowercase();
        let cleaned = PUNCTUATION.replace_all(&cleaned, "");
        for token in cleaned.split_whitespace() {
            if seen.insert(token.to_string()) {
                tokens.push(token.to_string());
            }
        }
    }
    tokens
}

/// Similarity of two token sets as a percentage (Sørensen–Dice coefficient).
///
/// Order and duplicates are ignored. Identical non-empty sets score 100, disjoint
/// sets score 0, and an empty side always scores 0.
pub fn get_weight<E, A>(expected: &[E], actual: &[A]) -> f64
where
    E: AsRef<str>,
    A: AsRef<str>,
{
    let expected: HashSet<&str> = expected.iter().map(AsRef::as_ref).collect();
    let actual: HashSet<&str> = actual.iter().map(AsRef::as_ref).collect();
    if expected.is_empty() || actual.is_empty() {
        return 0.0;
    }

    let shared = expected.intersection(&actual).count();
    (2.0 * shared as f64 / (expected.len() + actual.len()) as f64) * 100.0
}
