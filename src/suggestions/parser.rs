use lazy_static::lazy_static;
use regex::Regex;

const MAX_SUGGESTIONS: usize = 3;
const MAX_SUGGESTION_CHARS: usize = 100;

lazy_static! {
    static ref NUMBERING: Regex = Regex::new(r"^\d+\.\s*").unwrap();
    static ref BULLET: Regex = Regex::new(r"^[-•]\s*").unwrap();
}

/// Split a model reply into at most three clean sentences.
pub fn extract_sentences(reply: &str) -> Vec<String> {
    reply
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let line = NUMBERING.replace(line, "");
            BULLET.replace(&line, "").trim().to_string()
        })
        .filter(|line| !line.is_empty() && line.chars().count() < MAX_SUGGESTION_CHARS)
        .take(MAX_SUGGESTIONS)
        .collect()
}

/// Whether `sentence` shares a word with the selected cards, either word
/// containing the other, ignoring case.
pub fn mentions_cards(sentence: &str, cards: &str) -> bool {
    let sentence = sentence.to_lowercase();
    let cards = cards.to_lowercase();
    cards.split_whitespace().any(|card| {
        sentence
            .split_whitespace()
            .any(|word| word.contains(card) || card.contains(word))
    })
}
