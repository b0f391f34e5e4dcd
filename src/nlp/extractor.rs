//! Symptom lexicon, severity and duration matching

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use super::preprocess::normalize_text;
use crate::model::{Severity, SymptomRecord};
use crate::runtime::SymptomExtractor;

/// Canonical symptom name and the phrases that map to it
static LEXICON: &[(&str, &[&str])] = &[
    ("chest pain", &["chest pain", "chest tightness", "pain in my chest", "chest hurts"]),
    (
        "shortness of breath",
        &[
            "shortness of breath",
            "short of breath",
            "breathless",
            "can't breathe",
            "difficulty breathing",
            "trouble breathing",
        ],
    ),
    ("dizziness", &["dizziness", "dizzy", "lightheaded"]),
    ("fever", &["fever", "feverish", "temperature"]),
    ("headache", &["headache", "migraine", "head hurts", "head pain"]),
    ("cough", &["cough", "coughing"]),
    ("fatigue", &["fatigue", "tired", "exhausted", "no energy"]),
    ("nausea", &["nausea", "nauseous", "queasy"]),
    ("vomiting", &["vomiting", "vomit", "throwing up", "threw up"]),
    ("sore throat", &["sore throat", "throat hurts"]),
    ("rash", &["rash", "hives", "itchy skin"]),
    ("chills", &["chills", "shivering"]),
    (
        "abdominal pain",
        &["abdominal pain", "stomach ache", "stomachache", "stomach pain", "belly pain", "tummy ache"],
    ),
    ("neck stiffness", &["neck stiffness", "stiff neck"]),
    ("diarrhea", &["diarrhea", "diarrhoea"]),
    ("runny nose", &["runny nose", "stuffy nose", "congestion"]),
    ("back pain", &["back pain", "backache"]),
    ("muscle pain", &["muscle pain", "body aches", "muscle aches"]),
    ("numbness", &["numbness", "numb"]),
    ("confusion", &["confusion", "confused", "disoriented"]),
    ("seizure", &["seizure", "convulsion"]),
    ("blurred vision", &["blurred vision", "blurry vision"]),
    ("slurred speech", &["slurred speech"]),
    ("loss of consciousness", &["loss of consciousness", "fainted", "passed out"]),
    ("bleeding", &["bleeding"]),
];

static SEVERITY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(mild|moderate|severe|intense|unbearable|light|high)\b")
        .expect("Invalid severity regex")
});

/// Tried in order; the first hit wins
static DURATION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\bfor \d+ (?:minutes?|hours?|days?|weeks?|months?)\b",
        r"\bsince (?:yesterday|last night|this morning|last week)\b",
        r"\b\d+ (?:hours?|days?|weeks?) ago\b",
        r"\b(?:today|yesterday|last night|last week|this week)\b",
    ]
    .into_iter()
    .map(|p| Regex::new(p).expect("Invalid duration regex"))
    .collect()
});

static LONG_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:for )?(?:a )?(?:very )?long time\b|\bfor ages\b")
        .expect("Invalid duration regex")
});

struct LexiconEntry {
    canonical: &'static str,
    pattern: Regex,
}

/// Rule-based extractor over a fixed English lexicon
pub struct KeywordExtractor {
    entries: Vec<LexiconEntry>,
}

impl Default for KeywordExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl KeywordExtractor {
    pub fn new() -> Self {
        let entries = LEXICON
            .iter()
            .map(|&(canonical, phrases)| {
                let alternatives = phrases
                    .iter()
                    .map(|p| regex::escape(p))
                    .collect::<Vec<_>>()
                    .join("|");
                LexiconEntry {
                    canonical,
                    pattern: Regex::new(&format!(r"\b(?:{alternatives})\b"))
                        .expect("Invalid lexicon regex"),
                }
            })
            .collect();
        Self { entries }
    }

    /// Synchronous core of `extract`
    pub fn parse(&self, text: &str) -> SymptomRecord {
        let text = normalize_text(text);

        let mut record = SymptomRecord::new(
            self.entries
                .iter()
                .filter(|entry| entry.pattern.is_match(&text))
                .map(|entry| entry.canonical),
        );

        if let Some(m) = SEVERITY_PATTERN.find(&text) {
            record.severity = Severity::parse(m.as_str());
        }

        record.duration = if LONG_DURATION.is_match(&text) {
            Some("long".to_string())
        } else {
            DURATION_PATTERNS
                .iter()
                .find_map(|re| re.find(&text))
                .map(|m| m.as_str().to_string())
        };

        record
    }
}

#[async_trait]
impl SymptomExtractor for KeywordExtractor {
    async fn extract(&self, text: &str) -> SymptomRecord {
        self.parse(text)
    }
}
