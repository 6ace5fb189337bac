//! Tokenization shared by the keyword-driven strategies.

use std::collections::HashSet;

/// Lowercase words longer than three characters, de-duplicated in first-seen order.
pub fn keywords(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.to_lowercase()
        .split(|ch: char| !ch.is_alphanumeric())
        .filter(|word| word.chars().count() > 3)
        .filter(|word| seen.insert((*word).to_string()))
        .map(str::to_string)
        .collect()
}

pub fn keyword_set(text: &str) -> HashSet<String> {
    keywords(text).into_iter().collect()
}

/// Place-name tokens: whitespace or comma separated, longer than two characters.
pub fn location_tokens(location: &str) -> HashSet<String> {
    location
        .to_lowercase()
        .split(|ch: char| ch.is_whitespace() || ch == ',')
        .filter(|token| token.chars().count() > 2)
        .map(str::to_string)
        .collect()
}

/// Fraction of the words of `phrase` that also appear in `other`, 0.0-1.0.
pub fn word_overlap_fraction(phrase: &str, other: &str) -> f64 {
    let phrase = phrase.to_lowercase();
    let other = other.to_lowercase();
    let words: Vec<&str> = phrase.split_whitespace().collect();
    if words.is_empty() {
        return 0.0;
    }

    let other_words: HashSet<&str> = other.split_whitespace().collect();
    let matching = words.iter().filter(|word| other_words.contains(*word)).count();
    matching as f64 / words.len() as f64
}
