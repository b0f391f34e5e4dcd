//! Profile-based risk escalation
//!
//! Each rule is evaluated independently and in declaration order. A rule can
//! only lower the numeric level (raise urgency) and appends its clause to the
//! reason. Later rules see the reason as already amended by earlier ones.

use crate::model::{PatientProfile, SymptomRecord, TriageLevel, TriageResult};

/// A hard-coded escalation rule.
pub struct EscalationRule {
    /// Identifier recorded in `TriageResult::escalations`.
    pub id: &'static str,
    /// Least urgent level allowed once the rule fires.
    pub ceiling: TriageLevel,
    /// Text appended to the reason.
    pub clause: &'static str,
    /// Condition over the symptoms, the profile and the current reason.
    pub applies: fn(&SymptomRecord, &PatientProfile, &str) -> bool,
}

// ── Keyword sets ────────────────────────────────────────────

static CARDIAC_SYMPTOMS: &[&str] = &["chest pain", "shortness of breath", "dizziness"];

static CARDIAC_CONDITIONS: &[&str] = &["hypertension", "heart disease", "diabetes"];

/// Age from which a fever is treated as higher risk
const ELDERLY_AGE: u32 = 65;

// ── Rule registry ───────────────────────────────────────────

pub static ESCALATION_RULES: &[EscalationRule] = &[
    EscalationRule {
        id: "chronic_cardiac_risk",
        ceiling: TriageLevel::Resuscitation,
        clause: " (escalated due to chronic cardiac risk)",
        applies: |record, profile, _| {
            record.has_any(CARDIAC_SYMPTOMS)
                && CARDIAC_CONDITIONS.iter().any(|c| profile.has_condition(c))
        },
    },
    EscalationRule {
        id: "asthma",
        ceiling: TriageLevel::Emergent,
        clause: " (escalated due to asthma)",
        applies: |record, profile, _| {
            profile.has_condition("asthma") && record.has("shortness of breath")
        },
    },
    EscalationRule {
        id: "elderly_fever",
        ceiling: TriageLevel::Emergent,
        clause: " (elderly + fever = higher risk)",
        applies: |record, profile, _| profile.age >= ELDERLY_AGE && record.has("fever"),
    },
    EscalationRule {
        id: "immunocompromised",
        ceiling: TriageLevel::Emergent,
        clause: " (user is immunocompromised)",
        applies: |_, profile, reason| {
            profile.has_risk_factor("immunocompromised")
                && reason.to_lowercase().contains("infection")
        },
    },
];

/// Run every rule against `result`, tightening it in place.
pub fn apply_escalation(result: &mut TriageResult, record: &SymptomRecord, profile: &PatientProfile) {
    for rule in ESCALATION_RULES {
        if !(rule.applies)(record, profile, &result.reason) {
            continue;
        }
        result.level = result.level.min(rule.ceiling);
        result.reason.push_str(rule.clause);
        result.escalations.push(rule.id.to_string());
        tracing::debug!(rule = rule.id, level = result.level.number(), "Escalation rule fired");
    }
    result.recommendation = result.level.recommendation().to_string();
}
