//! HTTP request handlers

use super::types::{AnswerRequest, ErrorResponse, ReportResponse, StartSessionRequest};
use super::AppState;
use crate::db::{DbError, PatientSummary, SymptomTrend};
use crate::model::PatientProfile;
use crate::report::IntakeSummary;
use crate::runtime::{RuntimeError, SessionSnapshot, SessionStarted, TurnOutcome};
use crate::state_machine::TransitionError;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Intake sessions
        .route("/api/sessions", post(start_session))
        .route("/api/sessions/:id", get(get_session))
        .route("/api/sessions/:id/answer", post(answer))
        .route("/api/sessions/:id/followup", post(follow_up))
        .route("/api/sessions/:id/report", get(get_report))
        // Risk profiles
        .route("/api/profiles/:user_id", get(get_profile).put(put_profile))
        // History
        .route("/api/patients/summary", get(patient_summary))
        .route("/api/trends", get(symptom_trends))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Sessions
// ============================================================

async fn start_session(
    State(state): State<AppState>,
    Json(req): Json<StartSessionRequest>,
) -> Result<(StatusCode, Json<SessionStarted>), AppError> {
    let user_id = req.user_id.as_deref().map(str::trim).filter(|id| !id.is_empty());
    let started = state.runtime.start_session(user_id).await?;
    Ok((StatusCode::CREATED, Json(started)))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, AppError> {
    Ok(Json(state.runtime.snapshot(&id).await?))
}

async fn answer(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AnswerRequest>,
) -> Result<Json<TurnOutcome>, AppError> {
    Ok(Json(state.runtime.answer(&id, req.text).await?))
}

async fn follow_up(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AnswerRequest>,
) -> Result<Json<TurnOutcome>, AppError> {
    Ok(Json(state.runtime.follow_up(&id, req.text).await?))
}

async fn get_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ReportResponse>, AppError> {
    let snapshot = state.runtime.snapshot(&id).await?;
    let complete = snapshot.intake.is_complete();
    let summary = IntakeSummary::from_memory(&snapshot.intake.memory);
    let report = complete.then(|| summary.render());

    Ok(Json(ReportResponse {
        session_id: id,
        complete,
        summary,
        report,
    }))
}

// ============================================================
// Profiles
// ============================================================

async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<PatientProfile>, AppError> {
    state
        .db
        .get_profile(&user_id)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Profile not found: {user_id}")))
}

/// Accepts the same lenient shapes as stored profiles
async fn put_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<PatientProfile>, AppError> {
    if !body.is_object() {
        return Err(AppError::BadRequest("Profile must be a JSON object".to_string()));
    }
    let profile = PatientProfile::from_json(&body);
    state.db.upsert_profile(&user_id, &profile)?;
    tracing::info!(user_id = %user_id, age = profile.age, "Profile saved");
    Ok(Json(profile))
}

// ============================================================
// History
// ============================================================

async fn patient_summary(
    State(state): State<AppState>,
) -> Result<Json<Vec<PatientSummary>>, AppError> {
    Ok(Json(state.db.patient_summaries()?))
}

async fn symptom_trends(
    State(state): State<AppState>,
) -> Result<Json<Vec<SymptomTrend>>, AppError> {
    Ok(Json(state.db.symptom_trends()?))
}

async fn get_version() -> &'static str {
    concat!("triage-intake ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl From<RuntimeError> for AppError {
    fn from(e: RuntimeError) -> Self {
        match e {
            RuntimeError::SessionNotFound(_) => AppError::NotFound(e.to_string()),
            RuntimeError::Transition(
                TransitionError::Busy
                | TransitionError::AlreadyComplete
                | TransitionError::IntakeInProgress
                | TransitionError::FollowUpClosed,
            ) => AppError::Conflict(e.to_string()),
            RuntimeError::Transition(TransitionError::InvalidTransition(_)) => {
                AppError::BadRequest(e.to_string())
            }
            RuntimeError::Storage(_) | RuntimeError::ActorStopped => {
                AppError::Internal(e.to_string())
            }
        }
    }
}

impl From<DbError> for AppError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::SessionNotFound(_) => AppError::NotFound(e.to_string()),
            _ => AppError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
