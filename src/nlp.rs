//! Keyword-based entity extraction
//!
//! Default `SymptomExtractor`: normalizes the text, then matches a symptom
//! lexicon, severity words and duration phrases.

mod extractor;
mod preprocess;

pub use extractor::KeywordExtractor;
