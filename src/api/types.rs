//! API request and response types

use crate::report::IntakeSummary;
use serde::{Deserialize, Serialize};

/// Request to open a session
#[derive(Debug, Default, Deserialize)]
pub struct StartSessionRequest {
    /// Binds the session to a stored risk profile
    #[serde(default)]
    pub user_id: Option<String>,
}

/// One patient answer
#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub text: String,
}

/// Final (or partial) assessment
#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub session_id: String,
    pub complete: bool,
    pub summary: IntakeSummary,
    /// Rendered text, only once the intake is complete
    pub report: Option<String>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
