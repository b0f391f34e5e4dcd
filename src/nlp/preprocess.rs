//! Text normalization ahead of keyword matching

use std::sync::LazyLock;

use regex::Regex;

static SPECIAL_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9\s']").expect("Invalid normalization regex"));

static SLANG: &[(&str, &str)] = &[
    ("havvv", "have"),
    ("ystrday", "yesterday"),
    ("yday", "yesterday"),
    ("tmrw", "tomorrow"),
    ("hedache", "headache"),
    ("headake", "headache"),
    ("fevr", "fever"),
    ("feaver", "fever"),
    ("pls", "please"),
    ("cant", "can't"),
    ("wanna", "want to"),
    ("im", "i am"),
    ("u", "you"),
    ("hrs", "hours"),
    ("wks", "weeks"),
];

/// Lower-case, strip punctuation (apostrophes survive), collapse whitespace
/// and expand common misspellings
pub fn normalize_text(text: &str) -> String {
    let lower = text.to_lowercase();
    let cleaned = SPECIAL_CHARS.replace_all(&lower, " ");
    cleaned
        .split_whitespace()
        .map(|word| {
            SLANG
                .iter()
                .find(|(slang, _)| *slang == word)
                .map_or(word, |(_, standard)| *standard)
        })
        .collect::<Vec<_>>()
        .join(" ")
}
