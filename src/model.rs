//! Core intake data types
//!
//! Plain data holders shared by the classifier, the intake state machine
//! and the collaborators. Nothing in here performs I/O.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

// ============================================================================
// Severity
// ============================================================================

/// Reported severity of the symptoms
///
/// `High` is kept apart from `Severe`: the fever rule matches the literal
/// token "high" only, while the safety filter reacts to `Severe`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
    High,
    /// Any other token produced by a keyword scan (e.g. "intense")
    Other(String),
}

impl Severity {
    /// Parse a severity token. Returns `None` for blank input.
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim().to_lowercase();
        let severity = match token.as_str() {
            "" => return None,
            "mild" => Severity::Mild,
            "moderate" => Severity::Moderate,
            "severe" => Severity::Severe,
            "high" => Severity::High,
            _ => Severity::Other(token),
        };
        Some(severity)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Severity::Mild => "mild",
            Severity::Moderate => "moderate",
            Severity::Severe => "severe",
            Severity::High => "high",
            Severity::Other(token) => token,
        }
    }
}

impl TryFrom<String> for Severity {
    type Error = &'static str;

    fn try_from(token: String) -> Result<Self, Self::Error> {
        Severity::parse(&token).ok_or("blank severity")
    }
}

/// Deserialize an optional severity, reading blank tokens as absent
pub fn severity_or_none<'de, D>(deserializer: D) -> Result<Option<Severity>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let token: Option<String> = Option::deserialize(deserializer)?;
    Ok(token.as_deref().and_then(Severity::parse))
}

impl From<Severity> for String {
    fn from(severity: Severity) -> Self {
        severity.as_str().to_string()
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Symptom Record
// ============================================================================

/// Normalized output of entity extraction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymptomRecord {
    /// Case-folded, de-duplicated symptom names. Empty when nothing matched.
    #[serde(default)]
    pub symptoms: BTreeSet<String>,
    #[serde(default, deserialize_with = "severity_or_none")]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub duration: Option<String>,
}

impl SymptomRecord {
    pub fn new<I, S>(symptoms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            symptoms: normalize_set(symptoms),
            severity: None,
            duration: None,
        }
    }

    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    #[must_use]
    pub fn with_duration(mut self, duration: impl Into<String>) -> Self {
        let duration = duration.into();
        let trimmed = duration.trim();
        self.duration = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    pub fn has(&self, symptom: &str) -> bool {
        self.symptoms.contains(symptom)
    }

    pub fn has_any(&self, symptoms: &[&str]) -> bool {
        symptoms.iter().any(|s| self.has(s))
    }

    pub fn is_empty(&self) -> bool {
        self.symptoms.is_empty()
    }
}

/// Trim, lower-case and de-duplicate a list of terms, dropping blanks
pub fn normalize_set<I, S>(items: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .map(|s| s.as_ref().trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

// ============================================================================
// Patient Profile
// ============================================================================

/// Age assumed when a profile does not carry a usable one
pub const DEFAULT_AGE: u32 = 30;

/// Static risk profile, loaded once per session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientProfile {
    #[serde(default = "default_age")]
    pub age: u32,
    #[serde(default)]
    pub chronic_conditions: BTreeSet<String>,
    #[serde(default)]
    pub risk_factors: BTreeSet<String>,
}

fn default_age() -> u32 {
    DEFAULT_AGE
}

impl Default for PatientProfile {
    fn default() -> Self {
        Self {
            age: DEFAULT_AGE,
            chronic_conditions: BTreeSet::new(),
            risk_factors: BTreeSet::new(),
        }
    }
}

impl PatientProfile {
    pub fn new<C, R>(age: u32, chronic_conditions: C, risk_factors: R) -> Self
    where
        C: IntoIterator,
        C::Item: AsRef<str>,
        R: IntoIterator,
        R::Item: AsRef<str>,
    {
        Self {
            age,
            chronic_conditions: normalize_set(chronic_conditions),
            risk_factors: normalize_set(risk_factors),
        }
    }

    /// Lenient loader: any missing or malformed field falls back to its default.
    ///
    /// Accepts ages as numbers or numeric strings, and condition lists as
    /// arrays of strings (non-string entries are skipped) or a single
    /// comma-separated string.
    pub fn from_json(value: &Value) -> Self {
        let age = value
            .get("age")
            .and_then(|age| match age {
                Value::Number(n) => n.as_u64(),
                Value::String(s) => s.trim().parse::<u64>().ok(),
                _ => None,
            })
            .and_then(|age| u32::try_from(age).ok())
            .unwrap_or(DEFAULT_AGE);

        Self {
            age,
            chronic_conditions: lenient_terms(value.get("chronic_conditions")),
            risk_factors: lenient_terms(value.get("risk_factors")),
        }
    }

    pub fn has_condition(&self, condition: &str) -> bool {
        self.chronic_conditions.contains(condition)
    }

    pub fn has_risk_factor(&self, factor: &str) -> bool {
        self.risk_factors.contains(factor)
    }
}

fn lenient_terms(value: Option<&Value>) -> BTreeSet<String> {
    match value {
        Some(Value::Array(items)) => normalize_set(items.iter().filter_map(Value::as_str)),
        Some(Value::String(s)) => normalize_set(s.split(',')),
        _ => BTreeSet::new(),
    }
}

// ============================================================================
// Triage Level & Result
// ============================================================================

/// ESI-style urgency, 1 is the most urgent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum TriageLevel {
    Resuscitation = 1,
    Emergent = 2,
    Urgent = 3,
    LessUrgent = 4,
    NonUrgent = 5,
}

impl TriageLevel {
    pub const ALL: [TriageLevel; 5] = [
        TriageLevel::Resuscitation,
        TriageLevel::Emergent,
        TriageLevel::Urgent,
        TriageLevel::LessUrgent,
        TriageLevel::NonUrgent,
    ];

    pub fn from_number(level: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.number() == level)
    }

    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        match self {
            TriageLevel::Resuscitation => "Resuscitation",
            TriageLevel::Emergent => "Emergency",
            TriageLevel::Urgent => "Urgent",
            TriageLevel::LessUrgent => "Less Urgent",
            TriageLevel::NonUrgent => "Non-Urgent",
        }
    }

    pub fn recommendation(self) -> &'static str {
        recommendation_for(self.number())
    }
}

impl From<TriageLevel> for u8 {
    fn from(level: TriageLevel) -> Self {
        level.number()
    }
}

impl TryFrom<u8> for TriageLevel {
    type Error = String;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        Self::from_number(level).ok_or_else(|| format!("triage level out of range: {level}"))
    }
}

impl fmt::Display for TriageLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.number(), self.label())
    }
}

/// Next-step recommendation keyed by numeric level
pub fn recommendation_for(level: u8) -> &'static str {
    match level {
        1 => "Go to emergency room immediately.",
        2 => "Seek urgent care or ER if symptoms worsen.",
        3 => "Book a doctor within 24–48 hours.",
        4 => "See a doctor if it persists.",
        5 => "General advice and follow-up questions needed.",
        _ => "Unable to recommend next steps.",
    }
}

/// Output of the triage classifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriageResult {
    pub level: TriageLevel,
    pub reason: String,
    pub recommendation: String,
    /// Ids of the escalation rules that fired, in evaluation order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub escalations: Vec<String>,
}

// ============================================================================
// Visual Finding
// ============================================================================

/// Label reported by the image classifier. Advisory only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualFinding {
    pub label: String,
    /// Always within `[0, 1]`
    pub confidence: f64,
}

impl VisualFinding {
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            label: label.into(),
            confidence,
        }
    }

    /// Fallback reported when classification fails
    pub fn error() -> Self {
        Self::new("Error", 0.0)
    }

    pub fn is_error(&self) -> bool {
        self.label == "Error"
    }
}

// ============================================================================
// Collaborator Payloads
// ============================================================================

/// Everything an advice generator may use
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdviceRequest {
    pub name: Option<String>,
    pub age: Option<String>,
    pub symptoms: BTreeSet<String>,
    #[serde(default, deserialize_with = "severity_or_none")]
    pub severity: Option<Severity>,
    pub duration: Option<String>,
    pub triage: TriageResult,
}

/// One answered follow-up question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUpTurn {
    pub question: String,
    pub answer: String,
}

/// A post-intake question together with the patient context it is asked in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUpRequest {
    pub name: Option<String>,
    pub age: Option<String>,
    pub sex: Option<String>,
    pub symptoms: BTreeSet<String>,
    pub triage: Option<TriageResult>,
    /// Most recent earlier turns, oldest first
    pub history: Vec<FollowUpTurn>,
    pub question: String,
}

/// A completed intake, as recorded in the patient history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientVisit {
    pub name: String,
    pub age: String,
    pub sex: String,
    pub symptoms: BTreeSet<String>,
}

impl PatientVisit {
    /// History key, `name_age_sex` lower-cased
    pub fn patient_key(&self) -> String {
        format!(
            "{}_{}_{}",
            self.name.trim(),
            self.age.trim(),
            self.sex.trim()
        )
        .to_lowercase()
    }
}
